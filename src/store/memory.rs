//! In-memory Backing Store
//!
//! BTreeMap-based ordered map with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::Result;
use crate::wal::Operation;

use super::{is_valid_range, BackingStore, Entry, WriteBatch};

/// Ordered in-memory key-value map
///
/// ## Concurrency:
/// - `data`: RwLock (many concurrent readers, exclusive writer)
/// - `size`: approximate byte size, atomic
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    size: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Build a store from already-sorted entries (snapshot load)
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut size = 0;
        let data: BTreeMap<_, _> = entries
            .into_iter()
            .inspect(|(k, v)| size += k.len() + v.len())
            .collect();
        Self {
            data: RwLock::new(data),
            size: AtomicUsize::new(size),
        }
    }

    /// Apply operations in order under one write lock
    pub(crate) fn apply(&self, ops: &[Operation]) {
        let mut data = self.data.write();
        for op in ops {
            match op {
                Operation::Put { key, value } => {
                    let added = key.len() + value.len();
                    if let Some(old) = data.insert(key.clone(), value.clone()) {
                        self.size.fetch_sub(key.len() + old.len(), Ordering::Relaxed);
                    }
                    self.size.fetch_add(added, Ordering::Relaxed);
                }
                Operation::Delete { key } => {
                    if let Some(old) = data.remove(key) {
                        self.size.fetch_sub(key.len() + old.len(), Ordering::Relaxed);
                    }
                }
            }
        }
    }

    /// Copy of every entry in key order
    pub fn entries(&self) -> Vec<Entry> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Approximate size in bytes (keys + values)
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.data.write().clear();
        self.size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.apply(batch.operations());
        Ok(())
    }

    fn first_in(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Option<Entry>> {
        if !is_valid_range(lo, hi) {
            return Ok(None);
        }
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((lo, hi))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn last_in(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Option<Entry>> {
        if !is_valid_range(lo, hi) {
            return Ok(None);
        }
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((lo, hi))
            .next_back()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn scan(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Vec<Entry>> {
        if !is_valid_range(lo, hi) {
            return Ok(Vec::new());
        }
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((lo, hi))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn key_count(&self) -> usize {
        self.data.read().len()
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
