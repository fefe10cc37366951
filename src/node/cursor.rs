//! Ordered cursors over node data
//!
//! Each cursor owns a key range and narrows it from either end as it yields,
//! reading one entry per step from the Backing Store. They are finite,
//! double-ended and cheap to clone; a clone restarts from the clone point.

use std::ops::Bound;

use crate::address::NodeIndex;
use crate::error::{AreaDbError, Result};
use crate::keyspace::{borrow, prefix_end, prefix_range};
use crate::store::{BackingStore, Entry};

use super::{keys, Node, Tag};

/// Raw cursor over `[lo, hi)` of a store
struct RangeCursor<'s, S: BackingStore + ?Sized> {
    store: &'s S,
    lo: Bound<Vec<u8>>,
    hi: Bound<Vec<u8>>,
    done: bool,
}

impl<'s, S: BackingStore + ?Sized> Clone for RangeCursor<'s, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            lo: self.lo.clone(),
            hi: self.hi.clone(),
            done: self.done,
        }
    }
}

impl<'s, S: BackingStore + ?Sized> RangeCursor<'s, S> {
    fn over_prefix(store: &'s S, prefix: Vec<u8>) -> Self {
        let (lo, hi) = prefix_range(prefix);
        Self {
            store,
            lo,
            hi,
            done: false,
        }
    }

    fn step(&mut self, forward: bool) -> Option<Result<Entry>> {
        if self.done {
            return None;
        }
        let found = if forward {
            self.store.first_in(borrow(&self.lo), borrow(&self.hi))
        } else {
            self.store.last_in(borrow(&self.lo), borrow(&self.hi))
        };
        match found {
            Ok(Some((key, value))) => {
                if forward {
                    self.lo = Bound::Excluded(key.clone());
                } else {
                    self.hi = Bound::Excluded(key.clone());
                }
                Some(Ok((key, value)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn malformed(what: &str) -> AreaDbError {
    AreaDbError::Storage(format!("malformed {} key", what))
}

// =============================================================================
// sup / alt / hash entries of one node
// =============================================================================

/// `(index, value)` pairs of a sup array in index order
pub struct SupEntries<'s, S: BackingStore + ?Sized> {
    inner: RangeCursor<'s, S>,
}

/// `(index, value)` pairs of an alt array in index order
pub struct AltEntries<'s, S: BackingStore + ?Sized> {
    inner: RangeCursor<'s, S>,
}

/// `(key, value)` pairs of a hash array in lexical key order
pub struct HashEntries<'s, S: BackingStore + ?Sized> {
    inner: RangeCursor<'s, S>,
}

macro_rules! cursor_impls {
    ($name:ident, $item:ty, $decode:expr) => {
        impl<'s, S: BackingStore + ?Sized> Clone for $name<'s, S> {
            fn clone(&self) -> Self {
                Self {
                    inner: self.inner.clone(),
                }
            }
        }

        impl<'s, S: BackingStore + ?Sized> Iterator for $name<'s, S> {
            type Item = Result<$item>;

            fn next(&mut self) -> Option<Self::Item> {
                self.inner.step(true).map(|r| r.and_then($decode))
            }
        }

        impl<'s, S: BackingStore + ?Sized> DoubleEndedIterator for $name<'s, S> {
            fn next_back(&mut self) -> Option<Self::Item> {
                self.inner.step(false).map(|r| r.and_then($decode))
            }
        }
    };
}

fn decode_sup((key, value): Entry) -> Result<(NodeIndex, Vec<u8>)> {
    let index = keys::index_of(&key).ok_or_else(|| malformed("sup"))?;
    Ok((index, value))
}

fn decode_alt((key, value): Entry) -> Result<(NodeIndex, NodeIndex)> {
    let index = keys::index_of(&key).ok_or_else(|| malformed("alt"))?;
    let value = keys::decode_index(&value)
        .ok_or_else(|| AreaDbError::Storage(format!("alt value at {:#x} has {} bytes", index, value.len())))?;
    Ok((index, value))
}

fn decode_hash((key, value): Entry) -> Result<(String, Vec<u8>)> {
    let name = keys::hash_key_of(&key).ok_or_else(|| malformed("hash"))?;
    Ok((name.to_string(), value))
}

cursor_impls!(SupEntries, (NodeIndex, Vec<u8>), decode_sup);
cursor_impls!(AltEntries, (NodeIndex, NodeIndex), decode_alt);
cursor_impls!(HashEntries, (String, Vec<u8>), decode_hash);

// =============================================================================
// Every node of a store
// =============================================================================

/// Nodes in ascending id order
pub struct NodeIter<'s, S: BackingStore + ?Sized> {
    inner: RangeCursor<'s, S>,
}

impl<'s, S: BackingStore + ?Sized> Clone for NodeIter<'s, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'s, S: BackingStore + ?Sized> Iterator for NodeIter<'s, S> {
    type Item = Result<Node<'s, S>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, _) = match self.inner.step(true)? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        let Some(id) = keys::node_of(&key) else {
            self.inner.done = true;
            return Some(Err(malformed("node")));
        };
        // Skip the remaining keys of this node.
        let prefix = keys::node_prefix(id);
        match prefix_end(&prefix) {
            Some(end) => self.inner.lo = Bound::Included(end),
            None => self.inner.done = true,
        }
        Some(Ok(Node::open(self.inner.store, id)))
    }
}

impl<'s, S: BackingStore + ?Sized> DoubleEndedIterator for NodeIter<'s, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (key, _) = match self.inner.step(false)? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        let Some(id) = keys::node_of(&key) else {
            self.inner.done = true;
            return Some(Err(malformed("node")));
        };
        // Every key of the node sorts at or after its prefix.
        self.inner.hi = Bound::Excluded(keys::node_prefix(id));
        Some(Ok(Node::open(self.inner.store, id)))
    }
}

impl<'s, S: BackingStore + ?Sized> Node<'s, S> {
    pub fn sup_entries(&self, tag: Tag) -> SupEntries<'s, S> {
        SupEntries {
            inner: RangeCursor::over_prefix(self.store, keys::slot_prefix(self.id, tag)),
        }
    }

    pub fn alt_entries(&self, tag: Tag) -> AltEntries<'s, S> {
        AltEntries {
            inner: RangeCursor::over_prefix(self.store, keys::slot_prefix(self.id, tag)),
        }
    }

    pub fn hash_entries(&self, tag: Tag) -> HashEntries<'s, S> {
        HashEntries {
            inner: RangeCursor::over_prefix(self.store, keys::hash_prefix(self.id, tag)),
        }
    }

    /// Every node holding data, in id order
    pub fn all(store: &'s S) -> NodeIter<'s, S> {
        NodeIter {
            inner: RangeCursor::over_prefix(store, keys::all_nodes_prefix()),
        }
    }
}
