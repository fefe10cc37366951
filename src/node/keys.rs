//! Node key layout
//!
//! ```text
//! '.' | id                        existence marker (empty value)
//! '.' | id | 'V'                  node value
//! '.' | id | 'N'                  node name
//! '.' | id | tag | 0x00 | index   alt / sup slot
//! '.' | id | tag | 0x01 | key     hash slot
//! 'N' | name                      name -> id
//! '#' | "next_node"               next automatic id
//! ```

use crate::address::{NodeIndex, ADDRESS_BYTES};
use crate::keyspace::{decode_address, KeyBuilder, META, NODE_DATA, NODE_NAME, SLOT_HASH, SLOT_INDEX};

use super::{tag, Tag};

/// Every key belonging to node `id`; also its existence marker
pub(crate) fn node_prefix(id: NodeIndex) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA).address(id).finish()
}

/// Prefix shared by the data keys of every node
pub(crate) fn all_nodes_prefix() -> Vec<u8> {
    vec![NODE_DATA]
}

pub(crate) fn value_key(id: NodeIndex) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA).address(id).byte(tag::VALUE).finish()
}

pub(crate) fn name_slot_key(id: NodeIndex) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA).address(id).byte(tag::NAME).finish()
}

pub(crate) fn name_index_key(name: &str) -> Vec<u8> {
    KeyBuilder::new(NODE_NAME).bytes(name.as_bytes()).finish()
}

pub(crate) fn allocator_key() -> Vec<u8> {
    KeyBuilder::new(META).bytes(b"next_node").finish()
}

pub(crate) fn slot_prefix(id: NodeIndex, tag: Tag) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA)
        .address(id)
        .byte(tag)
        .byte(SLOT_INDEX)
        .finish()
}

pub(crate) fn slot_key(id: NodeIndex, tag: Tag, index: NodeIndex) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA)
        .address(id)
        .byte(tag)
        .byte(SLOT_INDEX)
        .address(index)
        .finish()
}

pub(crate) fn hash_prefix(id: NodeIndex, tag: Tag) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA)
        .address(id)
        .byte(tag)
        .byte(SLOT_HASH)
        .finish()
}

pub(crate) fn hash_key(id: NodeIndex, tag: Tag, key: &str) -> Vec<u8> {
    KeyBuilder::new(NODE_DATA)
        .address(id)
        .byte(tag)
        .byte(SLOT_HASH)
        .bytes(key.as_bytes())
        .finish()
}

/// Node id of any data key
pub(crate) fn node_of(key: &[u8]) -> Option<NodeIndex> {
    decode_address(key.get(1..)?)
}

/// Slot index of a numeric slot key
pub(crate) fn index_of(key: &[u8]) -> Option<NodeIndex> {
    decode_address(key.get(1 + ADDRESS_BYTES + 2..)?)
}

/// String key of a hash slot key
pub(crate) fn hash_key_of(key: &[u8]) -> Option<&str> {
    std::str::from_utf8(key.get(1 + ADDRESS_BYTES + 2..)?).ok()
}

/// Encoded node id / alt value
pub(crate) fn encode_index(value: NodeIndex) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub(crate) fn decode_index(raw: &[u8]) -> Option<NodeIndex> {
    let bytes: [u8; ADDRESS_BYTES] = raw.get(..ADDRESS_BYTES)?.try_into().ok()?;
    Some(NodeIndex::from_le_bytes(bytes))
}
