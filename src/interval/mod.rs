//! Interval Module
//!
//! Half-open address ranges and an in-memory ordered set of them.
//!
//! ## Responsibilities
//! - `Interval`: `[start, end)` with overlap / containment arithmetic
//! - `IntervalCollection`: sorted, disjoint set algebra with a lookup cache

mod collection;

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::address::Address;

pub use collection::IntervalCollection;

/// Half-open address range `[start, end)`
///
/// Empty iff `start >= end`. The derived `Ord` sorts by `start` then `end`;
/// `compare` is the start-only order used by collections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Interval {
    pub start: Address,
    pub end: Address,
}

impl Interval {
    pub const fn new(start: Address, end: Address) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Number of covered addresses (0 when empty)
    pub fn size(&self) -> Address {
        if self.is_empty() {
            0
        } else {
            self.end - self.start
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && self.end > addr
    }

    /// `other` lies within `self`
    pub fn contains_interval(&self, other: &Interval) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        other.start < self.end && self.start < other.end
    }

    /// Grow so that `addr` is covered
    pub fn extend(&mut self, addr: Address) {
        if self.is_empty() {
            self.start = addr;
            self.end = addr.saturating_add(1);
            return;
        }
        if addr < self.start {
            self.start = addr;
        }
        if addr >= self.end {
            self.end = addr.saturating_add(1);
        }
    }

    /// Clamp to the overlap with `other`; collapses to `end == start` when
    /// the two are disjoint
    pub fn intersect(&mut self, other: &Interval) {
        self.start = self.start.max(other.start);
        self.end = self.end.min(other.end);
        if self.end < self.start {
            self.end = self.start;
        }
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Order by `start` only
    pub fn compare(&self, other: &Interval) -> Ordering {
        self.start.cmp(&other.start)
    }
}

impl From<Range<Address>> for Interval {
    fn from(range: Range<Address>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<Interval> for Range<Address> {
    fn from(iv: Interval) -> Self {
        iv.start..iv.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}
