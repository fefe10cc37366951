//! IntervalCollection
//!
//! In-memory set of addresses stored as sorted, disjoint, non-adjacent
//! intervals. Touching intervals are coalesced, so the member list is the
//! canonical form of the covered set.

use std::cell::Cell;
use std::iter::FromIterator;

use crate::address::Address;

use super::Interval;

/// Ordered set of non-overlapping intervals
#[derive(Debug, Clone, Default)]
pub struct IntervalCollection {
    /// Sorted by `start`, pairwise disjoint and non-adjacent
    bag: Vec<Interval>,
    /// Position of the member most recently matched by `find`
    cache: Cell<Option<usize>>,
}

impl IntervalCollection {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Set algebra
    // =========================================================================

    /// Insert `iv`, merging with every member it overlaps or touches.
    /// Returns `true` iff the covered set changed.
    pub fn add(&mut self, iv: Interval) -> bool {
        if iv.is_empty() {
            return false;
        }

        let lo = self.bag.partition_point(|m| m.end < iv.start);
        let hi = self.bag.partition_point(|m| m.start <= iv.end);

        if hi == lo + 1 && self.bag[lo].contains_interval(&iv) {
            return false;
        }

        let mut merged = iv;
        if lo < hi {
            merged.start = merged.start.min(self.bag[lo].start);
            merged.end = merged.end.max(self.bag[hi - 1].end);
        }
        self.bag.splice(lo..hi, std::iter::once(merged));
        self.cache.set(None);
        true
    }

    /// Remove `iv` from every member, splitting members that straddle it.
    /// Returns `true` iff the covered set changed.
    pub fn subtract(&mut self, iv: Interval) -> bool {
        if iv.is_empty() {
            return false;
        }

        let lo = self.bag.partition_point(|m| m.end <= iv.start);
        let hi = self.bag.partition_point(|m| m.start < iv.end);
        if lo >= hi {
            return false;
        }

        let first = self.bag[lo];
        let last = self.bag[hi - 1];
        let mut rest = Vec::with_capacity(2);
        if first.start < iv.start {
            rest.push(Interval::new(first.start, iv.start));
        }
        if last.end > iv.end {
            rest.push(Interval::new(iv.end, last.end));
        }
        self.bag.splice(lo..hi, rest);
        self.cache.set(None);
        true
    }

    /// Union with `other`
    pub fn add_all(&mut self, other: &IntervalCollection) -> bool {
        other.bag.iter().fold(false, |changed, iv| self.add(*iv) | changed)
    }

    /// Difference with `other`
    pub fn subtract_all(&mut self, other: &IntervalCollection) -> bool {
        other
            .bag
            .iter()
            .fold(false, |changed, iv| self.subtract(*iv) | changed)
    }

    /// Keep only the parts also covered by `other`.
    /// Returns `true` iff the covered set changed.
    pub fn intersect(&mut self, other: &IntervalCollection) -> bool {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.bag.len() && j < other.bag.len() {
            let a = self.bag[i];
            let b = other.bag[j];
            let mut piece = a;
            piece.intersect(&b);
            if !piece.is_empty() {
                result.push(piece);
            }
            if a.end <= b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        if result == self.bag {
            return false;
        }
        self.bag = result;
        self.cache.set(None);
        true
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Does any member overlap `iv`? Non-strict also accepts a member that
    /// only touches `iv` at a boundary.
    pub fn has_common(&self, iv: &Interval, strict: bool) -> bool {
        if strict {
            if iv.is_empty() {
                return false;
            }
            let idx = self.bag.partition_point(|m| m.end <= iv.start);
            self.bag.get(idx).map_or(false, |m| m.overlaps(iv))
        } else {
            let idx = self.bag.partition_point(|m| m.end < iv.start);
            self.bag
                .get(idx)
                .map_or(false, |m| m.start <= iv.end && iv.start <= m.end)
        }
    }

    /// Does any member overlap (or, non-strict, touch) a member of `other`?
    pub fn has_common_set(&self, other: &IntervalCollection, strict: bool) -> bool {
        other.bag.iter().any(|iv| self.has_common(iv, strict))
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.find(addr).is_some()
    }

    /// Every address covered by `other` is covered by `self`
    pub fn contains_all(&self, other: &IntervalCollection) -> bool {
        other.bag.iter().all(|iv| {
            let idx = self.bag.partition_point(|m| m.start <= iv.start);
            idx > 0 && self.bag[idx - 1].contains_interval(iv)
        })
    }

    pub fn is_subset_of(&self, other: &IntervalCollection) -> bool {
        other.contains_all(self)
    }

    /// Member covering `addr`
    pub fn find(&self, addr: Address) -> Option<Interval> {
        if let Some(pos) = self.cache.get() {
            if let Some(m) = self.bag.get(pos) {
                if m.contains(addr) {
                    return Some(*m);
                }
            }
        }

        let idx = self.bag.partition_point(|m| m.start <= addr);
        if idx == 0 || !self.bag[idx - 1].contains(addr) {
            return None;
        }
        self.cache.set(Some(idx - 1));
        Some(self.bag[idx - 1])
    }

    /// Smallest covered address greater than `ea`
    pub fn next_addr(&self, ea: Address) -> Option<Address> {
        let from = ea.checked_add(1)?;
        let idx = self.bag.partition_point(|m| m.end <= from);
        self.bag.get(idx).map(|m| m.start.max(from))
    }

    /// Largest covered address smaller than `ea`
    pub fn prev_addr(&self, ea: Address) -> Option<Address> {
        let idx = self.bag.partition_point(|m| m.start < ea);
        if idx == 0 {
            return None;
        }
        let m = self.bag[idx - 1];
        Some((m.end - 1).min(ea - 1))
    }

    /// First member starting after `ea`
    pub fn next_interval(&self, ea: Address) -> Option<Interval> {
        let idx = self.bag.partition_point(|m| m.start <= ea);
        self.bag.get(idx).copied()
    }

    /// Last member ending at or before `ea`
    pub fn prev_interval(&self, ea: Address) -> Option<Interval> {
        let idx = self.bag.partition_point(|m| m.end <= ea);
        idx.checked_sub(1).map(|i| self.bag[i])
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Total number of covered addresses
    pub fn count(&self) -> Address {
        self.bag.iter().map(Interval::size).sum()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.bag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }

    pub fn get(&self, n: usize) -> Option<Interval> {
        self.bag.get(n).copied()
    }

    pub fn last(&self) -> Option<Interval> {
        self.bag.last().copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Interval> + ExactSizeIterator {
        self.bag.iter()
    }

    pub fn clear(&mut self) {
        self.bag.clear();
        self.cache.set(None);
    }

    pub fn swap(&mut self, other: &mut IntervalCollection) {
        std::mem::swap(&mut self.bag, &mut other.bag);
        self.cache.set(None);
        other.cache.set(None);
    }
}

impl PartialEq for IntervalCollection {
    fn eq(&self, other: &Self) -> bool {
        self.bag == other.bag
    }
}

impl Eq for IntervalCollection {}

impl From<Interval> for IntervalCollection {
    fn from(iv: Interval) -> Self {
        let mut set = Self::new();
        set.add(iv);
        set
    }
}

impl FromIterator<Interval> for IntervalCollection {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        let mut set = Self::new();
        for iv in iter {
            set.add(iv);
        }
        set
    }
}

impl<'a> IntoIterator for &'a IntervalCollection {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.bag.iter()
    }
}
