//! # AreaDB
//!
//! Storage core of a disassembly database:
//! - An address-interval index: persisted, named categories of
//!   non-overlapping `[start, end)` ranges (segments, functions, ...)
//! - A tagged sparse node store: nodes addressed by id or name, each with
//!   alt / sup / hash arrays, a value and chunked blobs
//! - A Backing Store underneath: in-memory, or durable with a write-ahead
//!   log and snapshot files
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │      IntervalIndex       │   │           Node           │
//! │ (categories of intervals)│   │  (alt/sup/hash, blobs)   │
//! └────────────┬─────────────┘   └────────────┬─────────────┘
//!              │      keyspace (byte keys)     │
//!              └───────────────┬───────────────┘
//!                              ▼
//!                ┌───────────────────────────┐
//!                │   BackingStore (trait)    │
//!                └─────┬───────────────┬─────┘
//!                      │               │
//!                      ▼               ▼
//!              ┌─────────────┐  ┌─────────────┐
//!              │ MemoryStore │  │  FileStore  │
//!              │  (RwLock)   │  │ WAL+Snapshot│
//!              └─────────────┘  └─────────────┘
//! ```
//!
//! `IntervalCollection` is the purely in-memory set algebra the index is
//! built around; it never touches a store.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod address;
pub mod config;
pub mod error;

pub mod index;
pub mod interval;
pub mod node;
pub mod store;
pub mod wal;

pub(crate) mod keyspace;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use address::{Address, AddressDiff, NodeIndex, BADADDR, BADNODE};
pub use config::{Config, WalSyncStrategy};
pub use error::{AreaDbError, Result};
pub use index::{IndexEntry, IndexState, IntervalIndex, MoveOutcome};
pub use interval::{Interval, IntervalCollection};
pub use node::{tag, Node, Tag};
pub use store::{BackingStore, FileStore, MemoryStore, WriteBatch};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AreaDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
