//! Key encoding inside the Backing Store
//!
//! Both the node store and the interval index live in one ordered byte-key
//! space. Every key starts with a one-byte prefix naming its family; all
//! integers are big-endian so byte order equals numeric order.
//!
//! ```text
//! '.' | node id | tag                       node value / name slot
//! '.' | node id | tag | 0x00 | index        numeric (alt/sup) slot
//! '.' | node id | tag | 0x01 | key          hash slot
//! 'N' | name                                name -> node id
//! '#' | "next_node"                         node id allocator
//! 'I' | category | 0x00 | 'h'               interval index header
//! 'I' | category | 0x00 | 'e' | start       interval index entry
//! 'I' | category | 0x00 | 'c'/'r' | start   regular / repeatable comment
//! ```

use std::ops::Bound;

use bytes::{BufMut, BytesMut};

use crate::address::{Address, ADDRESS_BYTES};

pub(crate) const NODE_DATA: u8 = b'.';
pub(crate) const NODE_NAME: u8 = b'N';
pub(crate) const META: u8 = b'#';
pub(crate) const INDEX: u8 = b'I';

/// Marker between tag and numeric index
pub(crate) const SLOT_INDEX: u8 = 0x00;
/// Marker between tag and string key
pub(crate) const SLOT_HASH: u8 = 0x01;

/// Incremental key builder
pub(crate) struct KeyBuilder {
    buf: BytesMut,
}

impl KeyBuilder {
    pub(crate) fn new(prefix: u8) -> Self {
        let mut buf = BytesMut::with_capacity(24);
        buf.put_u8(prefix);
        Self { buf }
    }

    pub(crate) fn byte(mut self, b: u8) -> Self {
        self.buf.put_u8(b);
        self
    }

    pub(crate) fn bytes(mut self, b: &[u8]) -> Self {
        self.buf.put_slice(b);
        self
    }

    pub(crate) fn address(mut self, a: Address) -> Self {
        self.buf.put_slice(&a.to_be_bytes());
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Decode a big-endian address from the first `ADDRESS_BYTES` of `bytes`.
pub(crate) fn decode_address(bytes: &[u8]) -> Option<Address> {
    let raw: [u8; ADDRESS_BYTES] = bytes.get(..ADDRESS_BYTES)?.try_into().ok()?;
    Some(Address::from_be_bytes(raw))
}

/// Smallest key strictly greater than every key starting with `prefix`.
/// `None` when no such key exists (prefix made only of 0xFF bytes).
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last != u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Owned key range covering every key that starts with `prefix`
pub(crate) fn prefix_range(prefix: Vec<u8>) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let hi = match prefix_end(&prefix) {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    (Bound::Included(prefix), hi)
}

/// Borrow an owned bound as a slice bound
pub(crate) fn borrow(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
