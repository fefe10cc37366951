//! Tests for blobs
//!
//! These tests verify:
//! - Multi-chunk round trips and sizes
//! - Chunk boundaries (exact multiples of the slot size, empty blobs)
//! - Overwriting with a shorter blob
//! - Deletion

use areadb::address::MAX_SPEC_SIZE;
use areadb::node::tag;
use areadb::{MemoryStore, Node, NodeIndex};

// =============================================================================
// Helper Functions
// =============================================================================

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn fresh_node(store: &MemoryStore) -> Node<'_, MemoryStore> {
    Node::create(store, None).unwrap().0
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_blob_spanning_four_slots() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    let data = pattern(MAX_SPEC_SIZE * 7 / 2);

    assert!(node.set_blob(&data, 0, tag::SUP).unwrap());

    assert_eq!(node.blob(0, tag::SUP).unwrap(), Some(data.clone()));
    assert_eq!(node.blob_size(0, tag::SUP).unwrap(), data.len());
    assert_eq!(node.last_index(tag::SUP).unwrap(), Some(3));
}

#[test]
fn test_blob_exact_multiple_gets_terminator() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    let data = pattern(MAX_SPEC_SIZE * 2);
    node.set_sup(3, b"neighbour", tag::SUP).unwrap();

    node.set_blob(&data, 0, tag::SUP).unwrap();

    assert_eq!(node.sup(2, tag::SUP).unwrap(), Some(Vec::new()));
    assert_eq!(node.blob(0, tag::SUP).unwrap(), Some(data));
    assert_eq!(node.sup(3, tag::SUP).unwrap(), Some(b"neighbour".to_vec()));
}

#[test]
fn test_empty_blob_is_present() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);

    assert_eq!(node.blob(10, tag::SUP).unwrap(), None);
    node.set_blob(&[], 10, tag::SUP).unwrap();

    assert_eq!(node.blob(10, tag::SUP).unwrap(), Some(Vec::new()));
    assert_eq!(node.blob_size(10, tag::SUP).unwrap(), 0);
}

#[test]
fn test_blob_at_nonzero_start_with_user_tag() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    let data = pattern(3000);

    node.set_blob(&data, 100, b'x').unwrap();

    assert_eq!(node.blob(100, b'x').unwrap(), Some(data));
    assert_eq!(node.blob(100, tag::SUP).unwrap(), None);
    assert_eq!(node.first_index(b'x').unwrap(), Some(100));
}

// =============================================================================
// Overwrite and Delete Tests
// =============================================================================

#[test]
fn test_shorter_blob_removes_old_chunks() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    node.set_blob(&pattern(5000), 0, tag::SUP).unwrap();

    node.set_blob(b"tiny", 0, tag::SUP).unwrap();

    assert_eq!(node.blob(0, tag::SUP).unwrap(), Some(b"tiny".to_vec()));
    assert_eq!(node.last_index(tag::SUP).unwrap(), Some(0));
}

#[test]
fn test_delete_blob() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    node.set_blob(&pattern(2500), 0, tag::SUP).unwrap();

    assert_eq!(node.delete_blob(0, tag::SUP).unwrap(), 3);
    assert_eq!(node.blob(0, tag::SUP).unwrap(), None);
    assert_eq!(node.delete_blob(0, tag::SUP).unwrap(), 0);
}

#[test]
fn test_blob_past_last_index_is_refused() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);

    let start = NodeIndex::MAX - 1;
    assert!(!node.set_blob(&pattern(3000), start, tag::SUP).unwrap());
    assert_eq!(node.first_index(tag::SUP).unwrap(), None);
}
