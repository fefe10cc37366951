//! Persisted records of an interval category
//!
//! ```text
//! 'I' | category | 0x00 | 'h'             StoredHeader
//! 'I' | category | 0x00 | 'e' | start     StoredEntry
//! 'I' | category | 0x00 | 'c' | start     regular comment (utf-8)
//! 'I' | category | 0x00 | 'r' | start     repeatable comment (utf-8)
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{AreaDbError, Result};
use crate::keyspace::{KeyBuilder, INDEX};

/// Layout version written into every category header
pub(crate) const HEADER_VERSION: u16 = 1;

const HEADER_TAG: u8 = b'h';
const ENTRY_TAG: u8 = b'e';
const REGULAR_COMMENT_TAG: u8 = b'c';
const REPEATABLE_COMMENT_TAG: u8 = b'r';

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredHeader {
    pub version: u16,
    pub record_size: u32,
}

/// Entry value; the start address lives in the key
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub end: Address,
    pub owner: Option<Address>,
    pub info: Vec<u8>,
}

/// Category names are NUL-terminated inside keys
pub(crate) fn is_valid_category(name: &str) -> bool {
    !name.is_empty() && !name.as_bytes().contains(&0)
}

fn base(name: &str) -> KeyBuilder {
    KeyBuilder::new(INDEX).bytes(name.as_bytes()).byte(0)
}

/// Every key of the category, header included
pub(crate) fn category_prefix(name: &str) -> Vec<u8> {
    base(name).finish()
}

pub(crate) fn header_key(name: &str) -> Vec<u8> {
    base(name).byte(HEADER_TAG).finish()
}

pub(crate) fn entry_prefix(name: &str) -> Vec<u8> {
    base(name).byte(ENTRY_TAG).finish()
}

pub(crate) fn entry_key(name: &str, start: Address) -> Vec<u8> {
    base(name).byte(ENTRY_TAG).address(start).finish()
}

pub(crate) fn comment_key(name: &str, start: Address, repeatable: bool) -> Vec<u8> {
    let tag = if repeatable {
        REPEATABLE_COMMENT_TAG
    } else {
        REGULAR_COMMENT_TAG
    };
    base(name).byte(tag).address(start).finish()
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| AreaDbError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    bincode::deserialize(raw).map_err(|e| AreaDbError::Serialization(e.to_string()))
}
