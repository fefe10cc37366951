//! Node Store Module
//!
//! Persisted nodes carrying tagged sparse arrays, addressed by a numeric id
//! and optionally by a unique name.
//!
//! ## Responsibilities
//! - Node lifecycle: create (named or unnamed), lookup, rename, kill
//! - alt arrays: `index -> NodeIndex`, absent reads as 0
//! - sup arrays: `index -> bytes` (at most `MAX_SPEC_SIZE`)
//! - hash arrays: `string key -> bytes`, lexically ordered
//! - the node value, blobs chunked over sup slots, ordered cursors
//!
//! Every logical mutation is one `WriteBatch`.

mod blob;
mod cursor;
mod keys;

use std::fmt;
use std::ops::Bound;

use tracing::debug;

use crate::address::{truncate_utf8, AddressDiff, NodeIndex, FIRST_AUTO_NODE, MAX_NAME_SIZE, MAX_SPEC_SIZE};
use crate::error::{AreaDbError, Result};
use crate::keyspace::{borrow, prefix_range};
use crate::store::{BackingStore, WriteBatch};

pub use cursor::{AltEntries, HashEntries, NodeIter, SupEntries};

/// Single-byte selector of a node sub-array
pub type Tag = u8;

/// Built-in tags. Callers must not reuse them for their own sub-arrays.
pub mod tag {
    use super::Tag;

    /// Array of alt values
    pub const ALT: Tag = b'A';
    /// Array of sup values
    pub const SUP: Tag = b'S';
    /// Array of hash values
    pub const HASH: Tag = b'H';
    /// Value of the node
    pub const VALUE: Tag = b'V';
    /// Name of the node
    pub const NAME: Tag = b'N';
    /// Links between nodes
    pub const LINK: Tag = b'L';

    pub const RESERVED: [Tag; 6] = [ALT, SUP, HASH, VALUE, NAME, LINK];

    pub fn is_reserved(tag: Tag) -> bool {
        RESERVED.contains(&tag)
    }
}

/// Handle to one node in a Backing Store
pub struct Node<'s, S: BackingStore + ?Sized> {
    store: &'s S,
    id: NodeIndex,
}

impl<'s, S: BackingStore + ?Sized> Clone for Node<'s, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, S: BackingStore + ?Sized> Copy for Node<'s, S> {}

impl<'s, S: BackingStore + ?Sized> fmt::Debug for Node<'s, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node").field("id", &format_args!("{:#x}", self.id)).finish()
    }
}

impl<'s, S: BackingStore + ?Sized> Node<'s, S> {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Handle to node `id`; nothing is read or written
    pub fn open(store: &'s S, id: NodeIndex) -> Self {
        Self { store, id }
    }

    /// Node bound to `name`
    pub fn find(store: &'s S, name: &str) -> Result<Option<Self>> {
        let name = truncate_utf8(name, MAX_NAME_SIZE);
        if name.is_empty() {
            return Ok(None);
        }
        match store.get(&keys::name_index_key(name))? {
            Some(raw) => {
                let id = keys::decode_index(&raw).ok_or_else(|| {
                    AreaDbError::Storage(format!("malformed id for node name {:?}", name))
                })?;
                Ok(Some(Self::open(store, id)))
            }
            None => Ok(None),
        }
    }

    /// Create a node with a fresh id, named or not.
    ///
    /// Names longer than `MAX_NAME_SIZE` bytes are cut at a character
    /// boundary. When the name is already bound, the existing node is
    /// returned with `false`.
    pub fn create(store: &'s S, name: Option<&str>) -> Result<(Self, bool)> {
        let name = name.map(|n| truncate_utf8(n, MAX_NAME_SIZE)).filter(|n| !n.is_empty());
        if let Some(name) = name {
            if let Some(existing) = Self::find(store, name)? {
                return Ok((existing, false));
            }
        }

        let mut id = match store.get(&keys::allocator_key())? {
            Some(raw) => keys::decode_index(&raw).ok_or_else(|| {
                AreaDbError::Storage("malformed node id allocator".to_string())
            })?,
            None => FIRST_AUTO_NODE,
        };
        while Self::exists_at(store, id)? {
            id = id
                .checked_add(1)
                .ok_or_else(|| AreaDbError::Storage("node ids exhausted".to_string()))?;
        }

        let mut batch = WriteBatch::new();
        batch.put(keys::node_prefix(id), Vec::new());
        batch.put(
            keys::allocator_key(),
            keys::encode_index(id.saturating_add(1)),
        );
        if let Some(name) = name {
            batch.put(keys::name_slot_key(id), name.as_bytes());
            batch.put(keys::name_index_key(name), keys::encode_index(id));
        }
        store.write(batch)?;

        debug!(id, name = name.unwrap_or(""), "created node");
        Ok((Self::open(store, id), true))
    }

    /// Does node `id` hold anything?
    pub fn exists_at(store: &S, id: NodeIndex) -> Result<bool> {
        let (lo, hi) = prefix_range(keys::node_prefix(id));
        Ok(store.first_in(borrow(&lo), borrow(&hi))?.is_some())
    }

    pub fn exists(&self) -> Result<bool> {
        Self::exists_at(self.store, self.id)
    }

    pub fn id(&self) -> NodeIndex {
        self.id
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn name(&self) -> Result<Option<String>> {
        match self.store.get(&keys::name_slot_key(self.id))? {
            Some(raw) => String::from_utf8(raw)
                .map(Some)
                .map_err(|e| AreaDbError::Serialization(format!("node name is not utf-8: {}", e))),
            None => Ok(None),
        }
    }

    /// Bind the node to `new_name`, or drop its name when empty. `false` if
    /// another node already has that name.
    pub fn rename(&self, new_name: &str) -> Result<bool> {
        let new_name = truncate_utf8(new_name, MAX_NAME_SIZE);
        let old_name = self.name()?;
        if old_name.as_deref() == Some(new_name) {
            return Ok(true);
        }
        if !new_name.is_empty() && self.store.contains(&keys::name_index_key(new_name))? {
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        if let Some(old) = &old_name {
            batch.delete(keys::name_index_key(old));
        }
        if new_name.is_empty() {
            batch.delete(keys::name_slot_key(self.id));
        } else {
            batch.put(keys::node_prefix(self.id), Vec::new());
            batch.put(keys::name_slot_key(self.id), new_name.as_bytes());
            batch.put(keys::name_index_key(new_name), keys::encode_index(self.id));
        }
        self.store.write(batch)?;

        debug!(id = self.id, old = old_name.as_deref().unwrap_or(""), new = new_name, "renamed node");
        Ok(true)
    }

    /// Remove every sub-array, the value and the name in one batch.
    /// `false` if the node held nothing.
    pub fn kill(&self) -> Result<bool> {
        let name = self.name()?;
        let mut batch = self.delete_prefix_batch(keys::node_prefix(self.id))?;
        if batch.is_empty() {
            return Ok(false);
        }
        if let Some(name) = &name {
            batch.delete(keys::name_index_key(name));
        }
        self.store.write(batch)?;

        debug!(id = self.id, "killed node");
        Ok(true)
    }

    // =========================================================================
    // Value
    // =========================================================================

    pub fn value(&self) -> Result<Option<Vec<u8>>> {
        self.store.get(&keys::value_key(self.id))
    }

    /// `false` if `value` exceeds `MAX_SPEC_SIZE`
    pub fn set_value(&self, value: &[u8]) -> Result<bool> {
        if value.len() > MAX_SPEC_SIZE {
            return Ok(false);
        }
        self.store.put(&keys::value_key(self.id), value)?;
        Ok(true)
    }

    pub fn delete_value(&self) -> Result<bool> {
        self.store.delete(&keys::value_key(self.id))
    }

    // =========================================================================
    // alt arrays
    // =========================================================================

    /// alt value at `index`; 0 when absent
    pub fn alt(&self, index: NodeIndex, tag: Tag) -> Result<NodeIndex> {
        Ok(self
            .store
            .get(&keys::slot_key(self.id, tag, index))?
            .and_then(|raw| keys::decode_index(&raw))
            .unwrap_or(0))
    }

    pub fn set_alt(&self, index: NodeIndex, value: NodeIndex, tag: Tag) -> Result<bool> {
        self.store
            .put(&keys::slot_key(self.id, tag, index), &keys::encode_index(value))?;
        Ok(true)
    }

    pub fn delete_alt(&self, index: NodeIndex, tag: Tag) -> Result<bool> {
        self.store.delete(&keys::slot_key(self.id, tag, index))
    }

    /// Relocate alt VALUES holding `ea + 1` for `ea` in `[from, from + size)`
    /// by `to - from`, unless `should_skip(ea)` says otherwise. Returns the
    /// number of values rewritten.
    pub fn adjust_alt<F>(&self, from: NodeIndex, to: NodeIndex, size: NodeIndex, mut should_skip: F) -> Result<usize>
    where
        F: FnMut(NodeIndex) -> bool,
    {
        let delta = to.wrapping_sub(from) as AddressDiff;
        let end = from.saturating_add(size);
        let (lo, hi) = prefix_range(keys::slot_prefix(self.id, tag::ALT));

        let mut batch = WriteBatch::new();
        for (key, raw) in self.store.scan(borrow(&lo), borrow(&hi))? {
            let Some(value) = keys::decode_index(&raw) else {
                continue;
            };
            let Some(ea) = value.checked_sub(1) else {
                continue;
            };
            if ea < from || ea >= end || should_skip(ea) {
                continue;
            }
            let Some(moved) = ea.checked_add_signed(delta).and_then(|a| a.checked_add(1)) else {
                continue;
            };
            batch.put(key, keys::encode_index(moved));
        }

        let adjusted = batch.len();
        self.store.write(batch)?;
        Ok(adjusted)
    }

    // =========================================================================
    // sup arrays
    // =========================================================================

    /// sup value at `index`; `None` when undefined
    pub fn sup(&self, index: NodeIndex, tag: Tag) -> Result<Option<Vec<u8>>> {
        self.store.get(&keys::slot_key(self.id, tag, index))
    }

    /// `false` if `value` exceeds `MAX_SPEC_SIZE`
    pub fn set_sup(&self, index: NodeIndex, value: &[u8], tag: Tag) -> Result<bool> {
        if value.len() > MAX_SPEC_SIZE {
            return Ok(false);
        }
        self.store.put(&keys::slot_key(self.id, tag, index), value)?;
        Ok(true)
    }

    pub fn delete_sup(&self, index: NodeIndex, tag: Tag) -> Result<bool> {
        self.store.delete(&keys::slot_key(self.id, tag, index))
    }

    pub fn first_index(&self, tag: Tag) -> Result<Option<NodeIndex>> {
        let (lo, hi) = prefix_range(keys::slot_prefix(self.id, tag));
        Ok(self
            .store
            .first_in(borrow(&lo), borrow(&hi))?
            .and_then(|(key, _)| keys::index_of(&key)))
    }

    pub fn last_index(&self, tag: Tag) -> Result<Option<NodeIndex>> {
        let (lo, hi) = prefix_range(keys::slot_prefix(self.id, tag));
        Ok(self
            .store
            .last_in(borrow(&lo), borrow(&hi))?
            .and_then(|(key, _)| keys::index_of(&key)))
    }

    /// First used index after `current`
    pub fn next_index(&self, current: NodeIndex, tag: Tag) -> Result<Option<NodeIndex>> {
        let (_, hi) = prefix_range(keys::slot_prefix(self.id, tag));
        let from = keys::slot_key(self.id, tag, current);
        Ok(self
            .store
            .first_in(Bound::Excluded(from.as_slice()), borrow(&hi))?
            .and_then(|(key, _)| keys::index_of(&key)))
    }

    /// Last used index before `current`
    pub fn prev_index(&self, current: NodeIndex, tag: Tag) -> Result<Option<NodeIndex>> {
        let prefix = keys::slot_prefix(self.id, tag);
        let until = keys::slot_key(self.id, tag, current);
        Ok(self
            .store
            .last_in(Bound::Included(prefix.as_slice()), Bound::Excluded(until.as_slice()))?
            .and_then(|(key, _)| keys::index_of(&key)))
    }

    /// Delete indices `[index1, index2)`, returning how many existed
    pub fn delete_range(&self, index1: NodeIndex, index2: NodeIndex, tag: Tag) -> Result<usize> {
        if index1 >= index2 {
            return Ok(0);
        }
        let lo = keys::slot_key(self.id, tag, index1);
        let hi = keys::slot_key(self.id, tag, index2);
        self.store
            .delete_range(Bound::Included(lo.as_slice()), Bound::Excluded(hi.as_slice()))
    }

    /// Clear the whole alt/sup array of `tag`
    pub fn delete_all(&self, tag: Tag) -> Result<bool> {
        let batch = self.delete_prefix_batch(keys::slot_prefix(self.id, tag))?;
        if batch.is_empty() {
            return Ok(false);
        }
        self.store.write(batch)?;
        Ok(true)
    }

    /// Move slots `[from, from + size)` to `[to, to + size)`, keeping their
    /// order. Slots at the destination that are not overwritten survive.
    /// Returns the number of moved slots; 0 (and no change) when the
    /// destination would leave the index space.
    pub fn shift(&self, from: NodeIndex, to: NodeIndex, size: NodeIndex, tag: Tag) -> Result<usize> {
        if size == 0 || from == to {
            return Ok(0);
        }
        let lo = keys::slot_key(self.id, tag, from);
        let hi = match from.checked_add(size) {
            Some(end) => Bound::Excluded(keys::slot_key(self.id, tag, end)),
            None => prefix_range(keys::slot_prefix(self.id, tag)).1,
        };
        let entries = self.store.scan(Bound::Included(lo.as_slice()), borrow(&hi))?;

        let mut moves = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(index) = keys::index_of(&key) else {
                continue;
            };
            let Some(target) = (index - from).checked_add(to) else {
                return Ok(0);
            };
            moves.push((key, keys::slot_key(self.id, tag, target), value));
        }

        let mut batch = WriteBatch::new();
        for (old, _, _) in &moves {
            batch.delete(old.as_slice());
        }
        for (_, new, value) in &moves {
            batch.put(new.as_slice(), value.as_slice());
        }
        self.store.write(batch)?;
        Ok(moves.len())
    }

    // =========================================================================
    // hash arrays
    // =========================================================================

    fn valid_hash_key(key: &str) -> bool {
        !key.is_empty() && key.len() <= MAX_SPEC_SIZE
    }

    pub fn hash(&self, key: &str, tag: Tag) -> Result<Option<Vec<u8>>> {
        if !Self::valid_hash_key(key) {
            return Ok(None);
        }
        self.store.get(&keys::hash_key(self.id, tag, key))
    }

    /// `false` if the key is empty or either key or value exceeds
    /// `MAX_SPEC_SIZE`
    pub fn set_hash(&self, key: &str, value: &[u8], tag: Tag) -> Result<bool> {
        if !Self::valid_hash_key(key) || value.len() > MAX_SPEC_SIZE {
            return Ok(false);
        }
        self.store.put(&keys::hash_key(self.id, tag, key), value)?;
        Ok(true)
    }

    pub fn delete_hash(&self, key: &str, tag: Tag) -> Result<bool> {
        if !Self::valid_hash_key(key) {
            return Ok(false);
        }
        self.store.delete(&keys::hash_key(self.id, tag, key))
    }

    /// Clear the whole hash array of `tag`
    pub fn delete_all_hashes(&self, tag: Tag) -> Result<bool> {
        let batch = self.delete_prefix_batch(keys::hash_prefix(self.id, tag))?;
        if batch.is_empty() {
            return Ok(false);
        }
        self.store.write(batch)?;
        Ok(true)
    }

    pub fn first_key(&self, tag: Tag) -> Result<Option<String>> {
        let (lo, hi) = prefix_range(keys::hash_prefix(self.id, tag));
        self.store
            .first_in(borrow(&lo), borrow(&hi))?
            .map(|(key, _)| decode_hash_key(&key))
            .transpose()
    }

    pub fn last_key(&self, tag: Tag) -> Result<Option<String>> {
        let (lo, hi) = prefix_range(keys::hash_prefix(self.id, tag));
        self.store
            .last_in(borrow(&lo), borrow(&hi))?
            .map(|(key, _)| decode_hash_key(&key))
            .transpose()
    }

    /// Lexically next key after `current`
    pub fn next_key(&self, current: &str, tag: Tag) -> Result<Option<String>> {
        let (_, hi) = prefix_range(keys::hash_prefix(self.id, tag));
        let from = keys::hash_key(self.id, tag, current);
        self.store
            .first_in(Bound::Excluded(from.as_slice()), borrow(&hi))?
            .map(|(key, _)| decode_hash_key(&key))
            .transpose()
    }

    /// Lexically previous key before `current`
    pub fn prev_key(&self, current: &str, tag: Tag) -> Result<Option<String>> {
        let prefix = keys::hash_prefix(self.id, tag);
        let until = keys::hash_key(self.id, tag, current);
        self.store
            .last_in(Bound::Included(prefix.as_slice()), Bound::Excluded(until.as_slice()))?
            .map(|(key, _)| decode_hash_key(&key))
            .transpose()
    }

    // =========================================================================
    // Whole-node copies
    // =========================================================================

    /// Replace the data of node `target` with a copy of this node's data.
    /// Names are not copied. Returns the number of copied slots.
    pub fn copy_to(&self, target: NodeIndex) -> Result<usize> {
        if target == self.id {
            return Ok(0);
        }
        let (batch, copied) = self.copy_batch(target)?;
        self.store.write(batch)?;
        Ok(copied)
    }

    /// Like `copy_to`, then removes this node's data. The name stays here.
    pub fn move_to(&self, target: NodeIndex) -> Result<usize> {
        if target == self.id {
            return Ok(0);
        }
        let (mut batch, copied) = self.copy_batch(target)?;
        let (lo, hi) = prefix_range(keys::node_prefix(self.id));
        let name_slot = keys::name_slot_key(self.id);
        for (key, _) in self.store.scan(borrow(&lo), borrow(&hi))? {
            if key != name_slot && key != keys::node_prefix(self.id) {
                batch.delete(key);
            }
        }
        self.store.write(batch)?;
        Ok(copied)
    }

    fn copy_batch(&self, target: NodeIndex) -> Result<(WriteBatch, usize)> {
        let source_prefix = keys::node_prefix(self.id);
        let target_prefix = keys::node_prefix(target);
        let target_name = keys::name_slot_key(target);
        let source_name = keys::name_slot_key(self.id);

        let mut batch = WriteBatch::new();
        let (lo, hi) = prefix_range(target_prefix.clone());
        for (key, _) in self.store.scan(borrow(&lo), borrow(&hi))? {
            if key != target_name && key != target_prefix {
                batch.delete(key);
            }
        }

        let mut copied = 0;
        let (lo, hi) = prefix_range(source_prefix.clone());
        for (key, value) in self.store.scan(borrow(&lo), borrow(&hi))? {
            if key == source_name || key == source_prefix {
                continue;
            }
            let mut moved = target_prefix.clone();
            moved.extend_from_slice(&key[source_prefix.len()..]);
            batch.put(moved, value);
            copied += 1;
        }
        batch.put(target_prefix, Vec::new());
        Ok((batch, copied))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn delete_prefix_batch(&self, prefix: Vec<u8>) -> Result<WriteBatch> {
        let (lo, hi) = prefix_range(prefix);
        let mut batch = WriteBatch::new();
        for (key, _) in self.store.scan(borrow(&lo), borrow(&hi))? {
            batch.delete(key);
        }
        Ok(batch)
    }
}

fn decode_hash_key(key: &[u8]) -> Result<String> {
    keys::hash_key_of(key)
        .map(str::to_string)
        .ok_or_else(|| AreaDbError::Storage("malformed hash key".to_string()))
}
