//! Storage Module
//!
//! The Backing Store: an ordered byte-key / byte-value map that the node store
//! and the interval index persist through.
//!
//! ## Responsibilities
//! - Point reads and atomic batched writes
//! - Ordered cursors (`first_in` / `last_in`) and range scans
//! - Durability (`FileStore` only): WAL + snapshot
//!
//! ## Implementations
//! - `MemoryStore`: BTreeMap behind a RwLock, nothing survives the process
//! - `FileStore`: MemoryStore + write-ahead log + snapshot file
//!
//! ## Concurrency
//! Methods take `&self` and lock internally, but the layers above assume a
//! single logical writer: interleaving two independent mutation sequences
//! without re-reading is the caller's problem.

mod file;
mod memory;
mod snapshot;

use std::ops::Bound;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshot::{SnapshotBuilder, SnapshotReader, SnapshotMeta};

use crate::error::Result;
use crate::wal::Operation;

/// A key-value pair read from the store
pub type Entry = (Vec<u8>, Vec<u8>);

/// Group of mutations applied all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(Operation::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Queue a delete
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(Operation::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.ops
    }
}

/// The Backing Store collaborator.
///
/// Operations in a `WriteBatch` are applied in order; a later operation on the
/// same key wins.
pub trait BackingStore {
    /// Read the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply a batch of mutations atomically
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Smallest entry inside the range
    fn first_in(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Option<Entry>>;

    /// Largest entry inside the range
    fn last_in(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Option<Entry>>;

    /// Every entry inside the range, in ascending key order
    fn scan(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Vec<Entry>>;

    /// Number of keys currently stored
    fn key_count(&self) -> usize;

    /// Make everything written so far durable
    fn flush(&self) -> Result<()>;

    // =========================================================================
    // Provided helpers
    // =========================================================================

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }

    /// Delete `key`; `true` iff it existed
    fn delete(&self, key: &[u8]) -> Result<bool> {
        if self.get(key)?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(batch)?;
        Ok(true)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Delete every key inside the range, returning how many were removed
    fn delete_range(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<usize> {
        let entries = self.scan(lo, hi)?;
        if entries.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for (key, _) in &entries {
            batch.delete(key.as_slice());
        }
        self.write(batch)?;
        Ok(entries.len())
    }
}

/// `true` when `BTreeMap::range` accepts the bounds and the range may hold
/// keys. Inverted ranges are simply empty here rather than a panic.
pub(crate) fn is_valid_range(lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> bool {
    match (lo, hi) {
        (Bound::Included(a), Bound::Included(b)) => a <= b,
        (Bound::Included(a), Bound::Excluded(b))
        | (Bound::Excluded(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Excluded(b)) => a < b,
        _ => true,
    }
}
