//! Interval Index Module
//!
//! A persisted, named category of non-overlapping intervals with per-entry
//! metadata, comments and tail ownership.
//!
//! ## Responsibilities
//! - Link to / create a category in the Backing Store
//! - Validated boundary edits (`set_start`, `set_end`, `resize_areas`)
//! - Overlap resolution (`prepare_creation`, `make_hole`)
//! - Ordered navigation and gap finding
//! - Relocation of entries (`move_areas`)
//!
//! ## Lifecycle
//! ```text
//! Unlinked ──link/create──▶ Linked ──terminate──▶ Terminated
//!     ▲                       │                        │
//!     └────────kill───────────┘◀──────link/create──────┘
//! ```
//! Every mutation is written through to the Backing Store as one
//! `WriteBatch` before the in-memory copy changes, so a failed write leaves
//! the previous state intact. Dropping a linked index terminates it.

mod record;

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::address::{Address, AddressDiff, MAX_COMMENT_SIZE};
use crate::error::{AreaDbError, Result};
use crate::interval::{Interval, IntervalCollection};
use crate::keyspace::{self, decode_address};
use crate::store::{BackingStore, WriteBatch};

use record::{StoredEntry, StoredHeader, HEADER_VERSION};

/// Where an index stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unlinked,
    Linked,
    Terminated,
}

/// One entry of an interval category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub interval: Interval,
    /// Fixed-size metadata, `record_size` bytes
    pub info: Vec<u8>,
    /// Start address of the owning entry when this entry is a tail
    pub owner: Option<Address>,
}

impl IndexEntry {
    pub fn start(&self) -> Address {
        self.interval.start
    }

    pub fn end(&self) -> Address {
        self.interval.end
    }
}

/// Result of `move_areas`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Every entry in the source range was moved
    Completed,
    /// The mover returned `code` for the entry starting at `at`; that entry
    /// was not moved
    Stopped { code: i32, at: Address },
    /// Nothing was changed: an entry straddles the source range, the offset
    /// overflows the address space, or the destination collides with an
    /// entry that is not moving
    Rejected,
}

/// Persisted category of intervals
pub struct IntervalIndex<'s, S: BackingStore + ?Sized> {
    store: &'s S,
    state: IndexState,
    name: String,
    record_size: usize,
    /// Sorted by start, pairwise disjoint
    entries: Vec<IndexEntry>,
    /// Owner start -> starts of its tails
    tails: BTreeMap<Address, BTreeSet<Address>>,
    /// Position of the entry most recently found by address
    cache: Cell<Option<usize>>,
}

/// Entry edits of one mutation, written as a single batch
#[derive(Default)]
struct Changes {
    /// Starts whose entries go away
    removed: Vec<Address>,
    /// Entries written under their (possibly new) start
    upserts: Vec<IndexEntry>,
    /// Owners that moved (`Some`) or were removed (`None`)
    renamed: Vec<(Address, Option<Address>)>,
    /// Comments following an entry to a new start
    moved: Vec<(Address, Address)>,
    /// Starts whose comments are deleted
    dropped: Vec<Address>,
}

impl Changes {
    fn single(entry: IndexEntry) -> Self {
        Self {
            upserts: vec![entry],
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.upserts.is_empty()
    }

    /// `entry` used to start at `from`; its comments and tails follow it
    fn relocate(&mut self, from: Address, entry: IndexEntry) {
        let to = entry.start();
        self.removed.push(from);
        self.upserts.push(entry);
        self.renamed.push((from, Some(to)));
        self.moved.push((from, to));
    }

    /// Its tails become independent
    fn remove(&mut self, start: Address, drop_comments: bool) {
        self.removed.push(start);
        self.renamed.push((start, None));
        if drop_comments {
            self.dropped.push(start);
        }
    }
}

impl<'s, S: BackingStore + ?Sized> IntervalIndex<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            state: IndexState::Unlinked,
            name: String::new(),
            record_size: 0,
            entries: Vec::new(),
            tails: BTreeMap::new(),
            cache: Cell::new(None),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Attach to an existing category. `false` if it does not exist, the
    /// name is invalid or the record size differs from the stored one.
    pub fn link(&mut self, name: &str, record_size: usize) -> Result<bool> {
        self.terminate()?;
        if !record::is_valid_category(name) {
            return Ok(false);
        }

        let header: StoredHeader = match self.store.get(&record::header_key(name))? {
            Some(raw) => record::decode(&raw)?,
            None => return Ok(false),
        };
        if header.version != HEADER_VERSION {
            return Err(AreaDbError::Storage(format!(
                "category {:?} has unsupported layout version {}",
                name, header.version
            )));
        }
        if header.record_size as usize != record_size {
            return Ok(false);
        }

        let prefix = record::entry_prefix(name);
        let (lo, hi) = keyspace::prefix_range(prefix.clone());
        let mut entries = Vec::new();
        for (key, value) in self.store.scan(keyspace::borrow(&lo), keyspace::borrow(&hi))? {
            let start = decode_address(&key[prefix.len()..]).ok_or_else(|| {
                AreaDbError::Storage(format!("malformed entry key in category {:?}", name))
            })?;
            let stored: StoredEntry = record::decode(&value)?;
            entries.push(IndexEntry {
                interval: Interval::new(start, stored.end),
                info: stored.info,
                owner: stored.owner,
            });
        }

        info!(category = name, entries = entries.len(), "linked interval index");
        self.attach(name, record_size, entries);
        Ok(true)
    }

    /// Create a new, empty category and attach to it. `false` if it already
    /// exists or the name is invalid.
    pub fn create(&mut self, name: &str, record_size: usize) -> Result<bool> {
        self.terminate()?;
        if !record::is_valid_category(name) {
            return Ok(false);
        }
        let Ok(stored_size) = u32::try_from(record_size) else {
            return Ok(false);
        };

        let key = record::header_key(name);
        if self.store.contains(&key)? {
            return Ok(false);
        }
        let header = StoredHeader {
            version: HEADER_VERSION,
            record_size: stored_size,
        };
        self.store.put(&key, &record::encode(&header)?)?;

        info!(category = name, record_size, "created interval index");
        self.attach(name, record_size, Vec::new());
        Ok(true)
    }

    fn attach(&mut self, name: &str, record_size: usize, entries: Vec<IndexEntry>) {
        self.name = name.to_string();
        self.record_size = record_size;
        self.tails.clear();
        for entry in &entries {
            if let Some(owner) = entry.owner {
                self.tails.entry(owner).or_default().insert(entry.start());
            }
        }
        self.entries = entries;
        self.cache.set(None);
        self.state = IndexState::Linked;
    }

    /// Flush the Backing Store and release the in-memory entries. Idempotent.
    pub fn terminate(&mut self) -> Result<()> {
        if self.state != IndexState::Linked {
            return Ok(());
        }
        self.store.flush()?;
        self.entries.clear();
        self.tails.clear();
        self.cache.set(None);
        self.state = IndexState::Terminated;
        Ok(())
    }

    /// Flush the Backing Store, staying linked
    pub fn save(&self) -> Result<()> {
        if self.is_linked() {
            self.store.flush()?;
        }
        Ok(())
    }

    /// Erase the whole category (header, entries, comments) and unlink
    pub fn kill(&mut self) -> Result<()> {
        if !self.is_linked() {
            return Ok(());
        }
        let (lo, hi) = keyspace::prefix_range(record::category_prefix(&self.name));
        let removed = self
            .store
            .delete_range(keyspace::borrow(&lo), keyspace::borrow(&hi))?;
        info!(category = %self.name, keys = removed, "killed interval index");
        self.zeroise();
        Ok(())
    }

    /// Reset to `Unlinked` without touching the Backing Store
    pub fn zeroise(&mut self) {
        self.name.clear();
        self.record_size = 0;
        self.entries.clear();
        self.tails.clear();
        self.cache.set(None);
        self.state = IndexState::Unlinked;
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn is_linked(&self) -> bool {
        self.state == IndexState::Linked
    }

    /// Category name (empty unless linked)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    // =========================================================================
    // Lookup and navigation
    // =========================================================================

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    /// Position of the entry covering `ea`
    fn position(&self, ea: Address) -> Option<usize> {
        if let Some(pos) = self.cache.get() {
            if self.entries.get(pos).map_or(false, |e| e.interval.contains(ea)) {
                return Some(pos);
            }
        }
        let idx = self.entries.partition_point(|e| e.start() <= ea);
        if idx == 0 || !self.entries[idx - 1].interval.contains(ea) {
            return None;
        }
        self.cache.set(Some(idx - 1));
        Some(idx - 1)
    }

    /// Entry covering `ea`
    pub fn get(&self, ea: Address) -> Option<&IndexEntry> {
        self.position(ea).map(|pos| &self.entries[pos])
    }

    /// Positional number of the entry covering `ea`
    pub fn area_num(&self, ea: Address) -> Option<usize> {
        self.position(ea)
    }

    pub fn get_by_index(&self, n: usize) -> Option<&IndexEntry> {
        self.entries.get(n)
    }

    pub fn first(&self) -> Option<&IndexEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&IndexEntry> {
        self.entries.last()
    }

    /// First entry starting after `ea`
    pub fn next(&self, ea: Address) -> Option<&IndexEntry> {
        self.next_area_num(ea).map(|n| &self.entries[n])
    }

    /// Last entry ending at or before `ea`
    pub fn prev(&self, ea: Address) -> Option<&IndexEntry> {
        self.prev_area_num(ea).map(|n| &self.entries[n])
    }

    pub fn next_area_num(&self, ea: Address) -> Option<usize> {
        let idx = self.entries.partition_point(|e| e.start() <= ea);
        (idx < self.entries.len()).then_some(idx)
    }

    pub fn prev_area_num(&self, ea: Address) -> Option<usize> {
        let idx = self.entries.partition_point(|e| e.end() <= ea);
        idx.checked_sub(1)
    }

    /// Smallest address at or after `ea` not covered by any entry
    pub fn next_gap(&self, ea: Address) -> Option<Address> {
        let Some(mut pos) = self.position(ea) else {
            return Some(ea);
        };
        loop {
            let end = self.entries[pos].end();
            match self.entries.get(pos + 1) {
                Some(next) if next.start() == end => pos += 1,
                _ => return Some(end),
            }
        }
    }

    /// Largest address before `ea` not covered by any entry
    pub fn prev_gap(&self, ea: Address) -> Option<Address> {
        let mut addr = ea.checked_sub(1)?;
        while let Some(pos) = self.position(addr) {
            addr = self.entries[pos].start().checked_sub(1)?;
        }
        Some(addr)
    }

    /// Visit every entry overlapping `[ea1, ea2)`; stops at the first
    /// non-zero visitor result and returns it
    pub fn for_all_areas<F>(&self, ea1: Address, ea2: Address, mut visitor: F) -> i32
    where
        F: FnMut(&IndexEntry) -> i32,
    {
        let range = Interval::new(ea1, ea2);
        let from = self.entries.partition_point(|e| e.end() <= ea1);
        for entry in self.entries[from..]
            .iter()
            .take_while(|e| e.start() < ea2)
            .filter(|e| e.interval.overlaps(&range))
        {
            let code = visitor(entry);
            if code != 0 {
                return code;
            }
        }
        0
    }

    /// Covered addresses as a collection (touching entries coalesce)
    pub fn to_collection(&self) -> IntervalCollection {
        self.entries.iter().map(|e| e.interval).collect()
    }

    // =========================================================================
    // Entry creation and deletion
    // =========================================================================

    fn padded(&self, info: &[u8]) -> Option<Vec<u8>> {
        if info.len() > self.record_size {
            return None;
        }
        let mut out = info.to_vec();
        out.resize(self.record_size, 0);
        Some(out)
    }

    fn write_entry(&self, batch: &mut WriteBatch, entry: &IndexEntry) -> Result<()> {
        let stored = StoredEntry {
            end: entry.end(),
            owner: entry.owner,
            info: entry.info.clone(),
        };
        batch.put(
            record::entry_key(&self.name, entry.start()),
            record::encode(&stored)?,
        );
        Ok(())
    }

    /// Insert a new entry. `false` if `iv` is empty, overlaps an existing
    /// entry, or `info` is longer than the record size. Comments kept at
    /// the same start by `delete_area(.., false)` are inherited.
    pub fn create_area(&mut self, iv: Interval, info: &[u8]) -> Result<bool> {
        if !self.is_linked() || iv.is_empty() {
            return Ok(false);
        }
        let Some(info) = self.padded(info) else {
            return Ok(false);
        };

        let idx = self.entries.partition_point(|e| e.start() < iv.start);
        if idx > 0 && self.entries[idx - 1].end() > iv.start {
            return Ok(false);
        }
        if idx < self.entries.len() && self.entries[idx].start() < iv.end {
            return Ok(false);
        }

        let entry = IndexEntry {
            interval: iv,
            info,
            owner: None,
        };
        self.commit(Changes::single(entry))?;
        Ok(true)
    }

    /// Delete the entry covering `ea`. With `delete_comments == false` its
    /// comments survive for an entry re-created at the same start. Tails
    /// owned by it become independent.
    pub fn delete_area(&mut self, ea: Address, delete_comments: bool) -> Result<bool> {
        if !self.is_linked() {
            return Ok(false);
        }
        let Some(pos) = self.position(ea) else {
            return Ok(false);
        };

        let mut changes = Changes::default();
        changes.remove(self.entries[pos].start(), delete_comments);
        self.commit(changes)?;
        Ok(true)
    }

    /// Replace the metadata of the entry covering `ea`; bounds never change
    pub fn update(&mut self, ea: Address, info: &[u8]) -> Result<bool> {
        if !self.is_linked() {
            return Ok(false);
        }
        let Some(pos) = self.position(ea) else {
            return Ok(false);
        };
        let Some(info) = self.padded(info) else {
            return Ok(false);
        };

        let mut entry = self.entries[pos].clone();
        entry.info = info;
        self.commit(Changes::single(entry))?;
        Ok(true)
    }

    // =========================================================================
    // Boundary edits
    // =========================================================================

    /// Could entry `n` start at `new_start` without emptying or overlapping?
    pub fn may_start_at(&self, n: usize, new_start: Address) -> bool {
        let Some(entry) = self.entries.get(n) else {
            return false;
        };
        new_start < entry.end() && (n == 0 || self.entries[n - 1].end() <= new_start)
    }

    /// Could entry `n` end at `new_end` without emptying or overlapping?
    pub fn may_end_at(&self, n: usize, new_end: Address) -> bool {
        let Some(entry) = self.entries.get(n) else {
            return false;
        };
        new_end > entry.start()
            && self
                .entries
                .get(n + 1)
                .map_or(true, |next| next.start() >= new_end)
    }

    /// Move the start of entry `n`; other entries are untouched
    pub fn set_start(&mut self, n: usize, new_start: Address) -> Result<bool> {
        if !self.is_linked() || !self.may_start_at(n, new_start) {
            return Ok(false);
        }
        let old_start = self.entries[n].start();
        if old_start == new_start {
            return Ok(true);
        }

        let mut entry = self.entries[n].clone();
        entry.interval.start = new_start;
        let mut changes = Changes::default();
        changes.relocate(old_start, entry);
        self.commit(changes)?;
        Ok(true)
    }

    /// Move the end of entry `n`; other entries are untouched
    pub fn set_end(&mut self, n: usize, new_end: Address) -> Result<bool> {
        if !self.is_linked() || !self.may_end_at(n, new_end) {
            return Ok(false);
        }
        let mut entry = self.entries[n].clone();
        entry.interval.end = new_end;
        self.commit(Changes::single(entry))?;
        Ok(true)
    }

    /// Like `set_start`, but when entry `n - 1` ends exactly where entry `n`
    /// starts, the previous entry's end follows the new start
    pub fn resize_areas(&mut self, n: usize, new_start: Address) -> Result<bool> {
        if !self.is_linked() || n >= self.entries.len() {
            return Ok(false);
        }
        let contiguous = n > 0 && self.entries[n - 1].end() == self.entries[n].start();
        if !contiguous {
            return self.set_start(n, new_start);
        }

        let mut prev = self.entries[n - 1].clone();
        let mut cur = self.entries[n].clone();
        if new_start <= prev.start() || new_start >= cur.end() {
            return Ok(false);
        }
        let old_start = cur.start();
        if old_start == new_start {
            return Ok(true);
        }

        prev.interval.end = new_start;
        cur.interval.start = new_start;
        let mut changes = Changes::single(prev);
        changes.relocate(old_start, cur);
        self.commit(changes)?;
        Ok(true)
    }

    /// Make room for a new entry `[start, end)`.
    ///
    /// An entry covering `start` is trimmed to end there, or deleted when it
    /// begins at `start`. Entries beginning inside the range are kept; the
    /// returned end is pulled back to the first of them instead. Callers
    /// must check `start < returned end` before creating.
    pub fn prepare_creation(&mut self, start: Address, end: Address) -> Result<Address> {
        if !self.is_linked() {
            return Ok(start);
        }
        if start >= end {
            return Ok(end);
        }

        let mut changes = Changes::default();
        if let Some(pos) = self.position(start) {
            let entry = &self.entries[pos];
            if entry.start() < start {
                let mut head = entry.clone();
                head.interval.end = start;
                changes.upserts.push(head);
            } else {
                changes.remove(entry.start(), true);
            }
        }

        // Skips the entry covering `start`, which never begins after it
        let idx = self.entries.partition_point(|e| e.start() <= start);
        let adjusted = match self.entries.get(idx) {
            Some(e) if e.start() < end => e.start(),
            _ => end,
        };

        if !changes.is_empty() {
            self.commit(changes)?;
        }
        Ok(adjusted)
    }

    /// Uncover `[ea1, ea2)`: overlapping entries are trimmed or deleted. An
    /// entry strictly containing the hole keeps its head and, with
    /// `create_tail`, gets a new tail entry `[ea2, end)` carrying its
    /// metadata. Returns `true` if anything changed.
    pub fn make_hole(&mut self, ea1: Address, ea2: Address, create_tail: bool) -> Result<bool> {
        if !self.is_linked() || ea1 >= ea2 {
            return Ok(false);
        }
        let from = self.entries.partition_point(|e| e.end() <= ea1);
        let mut changes = Changes::default();
        for entry in self.entries[from..].iter().take_while(|e| e.start() < ea2) {
            let (start, end) = (entry.start(), entry.end());
            if start < ea1 {
                let mut head = entry.clone();
                head.interval.end = ea1;
                changes.upserts.push(head);
                if end > ea2 && create_tail {
                    let mut tail = entry.clone();
                    tail.interval = Interval::new(ea2, end);
                    changes.upserts.push(tail);
                }
            } else if end > ea2 {
                let mut rest = entry.clone();
                rest.interval.start = ea2;
                changes.relocate(start, rest);
            } else {
                changes.remove(start, true);
            }
        }

        if changes.is_empty() {
            return Ok(false);
        }
        debug!(category = %self.name, ea1, ea2, create_tail, "make hole");
        self.commit(changes)?;
        Ok(true)
    }

    // =========================================================================
    // Relocation
    // =========================================================================

    /// Starts of the entries inside `[from, from + size)` in the order they
    /// must be moved, plus the offset. `None` when the move must be refused.
    fn plan_move(&self, from: Address, to: Address, size: Address) -> Option<(Vec<Address>, AddressDiff)> {
        let source = Interval::new(from, from.checked_add(size)?);
        let delta = to.wrapping_sub(from) as AddressDiff;
        if source.is_empty() || delta == 0 {
            return Some((Vec::new(), delta));
        }

        let lo = self.entries.partition_point(|e| e.end() <= source.start);
        let mut selected = Vec::new();
        let mut targets = Vec::new();
        for entry in self.entries[lo..].iter().take_while(|e| e.start() < source.end) {
            if !source.contains_interval(&entry.interval) {
                return None;
            }
            selected.push(entry.start());
            targets.push(shifted(entry.interval, delta)?);
        }

        // Everything overlapping the source is moving, so only entries
        // outside it can be in the way
        for target in &targets {
            let first = self.entries.partition_point(|e| e.end() <= target.start);
            let collides = self.entries[first..]
                .iter()
                .take_while(|e| e.start() < target.end)
                .any(|e| !e.interval.overlaps(&source));
            if collides {
                return None;
            }
        }

        // Moving up, the highest entry goes first so no entry ever lands on
        // one that has not moved yet.
        if delta > 0 {
            selected.reverse();
        }
        Some((selected, delta))
    }

    /// Relocate every entry inside `[from, from + size)` by `to - from`.
    ///
    /// `mover` sees each entry's new interval and may rewrite its metadata;
    /// a non-zero return stops the move with that entry left in place.
    /// Entries moved before the stop stay moved.
    pub fn move_areas<F>(&mut self, from: Address, to: Address, size: Address, mut mover: F) -> Result<MoveOutcome>
    where
        F: FnMut(Interval, &mut [u8], AddressDiff) -> i32,
    {
        if !self.is_linked() {
            return Ok(MoveOutcome::Rejected);
        }
        let Some((order, delta)) = self.plan_move(from, to, size) else {
            return Ok(MoveOutcome::Rejected);
        };

        for old_start in order {
            let Ok(pos) = self.entries.binary_search_by_key(&old_start, IndexEntry::start) else {
                continue;
            };
            let mut entry = self.entries[pos].clone();
            let Some(target) = shifted(entry.interval, delta) else {
                return Ok(MoveOutcome::Rejected);
            };

            let code = mover(target, &mut entry.info, delta);
            if code != 0 {
                return Ok(MoveOutcome::Stopped { code, at: old_start });
            }

            entry.interval = target;
            let mut changes = Changes::default();
            changes.relocate(old_start, entry);
            self.commit(changes)?;
        }
        Ok(MoveOutcome::Completed)
    }

    /// All-or-nothing `move_areas`: the mover runs on every entry first and
    /// nothing is written unless all of them return zero
    pub fn move_areas_atomic<F>(&mut self, from: Address, to: Address, size: Address, mut mover: F) -> Result<MoveOutcome>
    where
        F: FnMut(Interval, &mut [u8], AddressDiff) -> i32,
    {
        if !self.is_linked() {
            return Ok(MoveOutcome::Rejected);
        }
        let Some((order, delta)) = self.plan_move(from, to, size) else {
            return Ok(MoveOutcome::Rejected);
        };
        if order.is_empty() {
            return Ok(MoveOutcome::Completed);
        }

        let mut changes = Changes::default();
        for old_start in order {
            let Ok(pos) = self.entries.binary_search_by_key(&old_start, IndexEntry::start) else {
                continue;
            };
            let mut entry = self.entries[pos].clone();
            let Some(target) = shifted(entry.interval, delta) else {
                return Ok(MoveOutcome::Rejected);
            };
            let code = mover(target, &mut entry.info, delta);
            if code != 0 {
                return Ok(MoveOutcome::Stopped { code, at: old_start });
            }
            entry.interval = target;
            changes.relocate(old_start, entry);
        }

        self.commit(changes)?;
        Ok(MoveOutcome::Completed)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Regular or repeatable comment of the entry covering `ea`
    pub fn comment(&self, ea: Address, repeatable: bool) -> Result<Option<String>> {
        let Some(pos) = self.position(ea) else {
            return Ok(None);
        };
        let key = record::comment_key(&self.name, self.entries[pos].start(), repeatable);
        match self.store.get(&key)? {
            Some(raw) => String::from_utf8(raw)
                .map(Some)
                .map_err(|e| AreaDbError::Serialization(format!("comment is not utf-8: {}", e))),
            None => Ok(None),
        }
    }

    /// Set the comment of the entry covering `ea`; an empty text deletes
    /// it. Text beyond `MAX_COMMENT_SIZE` bytes is cut at a character
    /// boundary. `false` if no entry covers `ea`.
    pub fn set_comment(&mut self, ea: Address, text: &str, repeatable: bool) -> Result<bool> {
        if !self.is_linked() {
            return Ok(false);
        }
        let Some(pos) = self.position(ea) else {
            return Ok(false);
        };

        let key = record::comment_key(&self.name, self.entries[pos].start(), repeatable);
        let text = crate::address::truncate_utf8(text, MAX_COMMENT_SIZE);
        let mut batch = WriteBatch::new();
        if text.is_empty() {
            batch.delete(key);
        } else {
            batch.put(key, text.as_bytes());
        }
        self.store.write(batch)?;
        Ok(true)
    }

    // =========================================================================
    // Tail ownership
    // =========================================================================

    /// Make the entry covering `ea` a tail of the entry covering `owner`, or
    /// independent again with `None`. Ownership is one level deep: an owner
    /// cannot itself be a tail, and an entry with tails cannot become one.
    pub fn set_owner(&mut self, ea: Address, owner: Option<Address>) -> Result<bool> {
        if !self.is_linked() {
            return Ok(false);
        }
        let Some(pos) = self.position(ea) else {
            return Ok(false);
        };

        let owner_start = match owner {
            None => None,
            Some(addr) => {
                let Some(owner_pos) = self.position(addr) else {
                    return Ok(false);
                };
                let owner_entry = &self.entries[owner_pos];
                let tail_start = self.entries[pos].start();
                if owner_pos == pos
                    || owner_entry.owner.is_some()
                    || self.tails.contains_key(&tail_start)
                {
                    return Ok(false);
                }
                Some(owner_entry.start())
            }
        };

        let mut entry = self.entries[pos].clone();
        entry.owner = owner_start;
        self.commit(Changes::single(entry))?;
        Ok(true)
    }

    /// Owning entry of the tail covering `ea`
    pub fn owner_of(&self, ea: Address) -> Option<&IndexEntry> {
        let owner = self.get(ea)?.owner?;
        self.entry_at(owner)
    }

    /// `true` if an entry covers `ea` and it is not a tail
    pub fn is_owner(&self, ea: Address) -> bool {
        self.get(ea).map_or(false, |e| e.owner.is_none())
    }

    /// Tails owned by the entry covering `ea`, in address order
    pub fn tails_of(&self, ea: Address) -> Vec<&IndexEntry> {
        let Some(owner) = self.get(ea).map(IndexEntry::start) else {
            return Vec::new();
        };
        self.tails
            .get(&owner)
            .into_iter()
            .flatten()
            .filter_map(|start| self.entry_at(*start))
            .collect()
    }

    fn entry_at(&self, start: Address) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by_key(&start, IndexEntry::start)
            .ok()
            .map(|pos| &self.entries[pos])
    }

    // =========================================================================
    // Write-through
    // =========================================================================

    /// Persist `changes` as one batch, then apply them to the in-memory
    /// entries. Only the touched entries and the tails of renamed owners
    /// are written.
    fn commit(&mut self, mut changes: Changes) -> Result<()> {
        self.retarget_tails(&mut changes);
        let mut batch = WriteBatch::new();

        for &start in &changes.removed {
            batch.delete(record::entry_key(&self.name, start));
        }
        for entry in &changes.upserts {
            self.write_entry(&mut batch, entry)?;
        }

        let mut carried = Vec::new();
        for &(from, to) in &changes.moved {
            for repeatable in [false, true] {
                let key = record::comment_key(&self.name, from, repeatable);
                if let Some(text) = self.store.get(&key)? {
                    batch.delete(key);
                    carried.push((record::comment_key(&self.name, to, repeatable), text));
                }
            }
        }
        for &start in &changes.dropped {
            for repeatable in [false, true] {
                batch.delete(record::comment_key(&self.name, start, repeatable));
            }
        }
        for (key, text) in carried {
            batch.put(key, text);
        }

        self.store.write(batch)?;
        self.apply(changes);
        Ok(())
    }

    /// Point the tails of every renamed owner at its new start, or make
    /// them independent when the owner is gone. Owners are looked up by
    /// their old start, so chains of renames never compound.
    fn retarget_tails(&self, changes: &mut Changes) {
        if changes.renamed.is_empty() {
            return;
        }
        let renamed: HashMap<Address, Option<Address>> = changes.renamed.iter().copied().collect();

        for entry in &mut changes.upserts {
            if let Some(&to) = entry.owner.and_then(|o| renamed.get(&o)) {
                entry.owner = to;
            }
        }

        let removed: HashSet<Address> = changes.removed.iter().copied().collect();
        let written: HashSet<Address> = changes.upserts.iter().map(IndexEntry::start).collect();
        let mut retargeted = Vec::new();
        for (from, to) in &renamed {
            for tail in self.tails.get(from).into_iter().flatten() {
                if removed.contains(tail) || written.contains(tail) {
                    continue;
                }
                if let Some(entry) = self.entry_at(*tail) {
                    let mut entry = entry.clone();
                    entry.owner = *to;
                    retargeted.push(entry);
                }
            }
        }
        changes.upserts.extend(retargeted);
    }

    /// Removals go first so an upsert may reuse a start freed in the same
    /// change
    fn apply(&mut self, changes: Changes) {
        for start in changes.removed {
            if let Ok(pos) = self.entries.binary_search_by_key(&start, IndexEntry::start) {
                let old = self.entries.remove(pos);
                self.unlink_tail(&old);
            }
        }
        for entry in changes.upserts {
            let (start, owner) = (entry.start(), entry.owner);
            match self.entries.binary_search_by_key(&start, IndexEntry::start) {
                Ok(pos) => {
                    let old = std::mem::replace(&mut self.entries[pos], entry);
                    self.unlink_tail(&old);
                }
                Err(pos) => self.entries.insert(pos, entry),
            }
            if let Some(owner) = owner {
                self.tails.entry(owner).or_default().insert(start);
            }
        }
        self.cache.set(None);
    }

    fn unlink_tail(&mut self, entry: &IndexEntry) {
        let Some(owner) = entry.owner else {
            return;
        };
        if let Some(tails) = self.tails.get_mut(&owner) {
            tails.remove(&entry.start());
            if tails.is_empty() {
                self.tails.remove(&owner);
            }
        }
    }
}

impl<'s, S: BackingStore + ?Sized> Drop for IntervalIndex<'s, S> {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!(category = %self.name, error = %e, "failed to terminate interval index");
        }
    }
}

fn shifted(iv: Interval, delta: AddressDiff) -> Option<Interval> {
    Some(Interval::new(
        iv.start.checked_add_signed(delta)?,
        iv.end.checked_add_signed(delta)?,
    ))
}
