//! Snapshot Module
//!
//! Immutable on-disk image of the whole Backing Store, written by `save()`
//! and loaded on open before the WAL is replayed.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "ADBS" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... repeated for each entry, ascending key order ...  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes)                                        │
//! │   DataCRC: u32 (4) | Padding (4)                        │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod reader;

use std::path::PathBuf;

pub use builder::SnapshotBuilder;
pub use reader::SnapshotReader;

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// Magic bytes identifying an AreaDB snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"ADBS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: DataCRC (4) + Padding (4) = 8 bytes
pub(crate) const FOOTER_SIZE: u64 = 8;

/// Metadata of a finished snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotMeta {
    /// Path to the snapshot file
    pub path: PathBuf,
    /// Number of entries written
    pub entry_count: u64,
    /// File size in bytes
    pub file_size: u64,
}
