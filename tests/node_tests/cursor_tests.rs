//! Tests for node cursors
//!
//! These tests verify:
//! - Forward and backward iteration of sup / alt / hash arrays
//! - Meeting in the middle of a double-ended walk
//! - Iteration over every node of a store

use areadb::node::tag;
use areadb::{MemoryStore, Node, NodeIndex};

fn fresh_node(store: &MemoryStore) -> Node<'_, MemoryStore> {
    Node::create(store, None).unwrap().0
}

// =============================================================================
// Array Cursor Tests
// =============================================================================

#[test]
fn test_hash_entries_in_lexical_order() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    for key in ["b", "a", "c"] {
        node.set_hash(key, key.as_bytes(), tag::HASH).unwrap();
    }

    let forward: Vec<String> = node
        .hash_entries(tag::HASH)
        .map(|e| e.unwrap().0)
        .collect();
    assert_eq!(forward, vec!["a", "b", "c"]);

    let backward: Vec<String> = node
        .hash_entries(tag::HASH)
        .rev()
        .map(|e| e.unwrap().0)
        .collect();
    assert_eq!(backward, vec!["c", "b", "a"]);
}

#[test]
fn test_sup_entries_in_numeric_order() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    for index in [0x100, 0x2, 0x10000, 0x30] {
        node.set_sup(index, b"v", tag::SUP).unwrap();
    }

    let indices: Vec<NodeIndex> = node.sup_entries(tag::SUP).map(|e| e.unwrap().0).collect();

    assert_eq!(indices, vec![0x2, 0x30, 0x100, 0x10000]);
}

#[test]
fn test_alt_entries_decode_values() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    node.set_alt(1, 10, tag::ALT).unwrap();
    node.set_alt(2, 20, tag::ALT).unwrap();

    let pairs: Vec<(NodeIndex, NodeIndex)> =
        node.alt_entries(tag::ALT).map(|e| e.unwrap()).collect();

    assert_eq!(pairs, vec![(1, 10), (2, 20)]);
}

#[test]
fn test_double_ended_meets_in_middle() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    for i in 0..4 {
        node.set_sup(i, &[i as u8], tag::SUP).unwrap();
    }

    let mut cursor = node.sup_entries(tag::SUP);
    assert_eq!(cursor.next().unwrap().unwrap().0, 0);
    assert_eq!(cursor.next_back().unwrap().unwrap().0, 3);
    assert_eq!(cursor.next().unwrap().unwrap().0, 1);
    assert_eq!(cursor.next_back().unwrap().unwrap().0, 2);
    assert!(cursor.next().is_none());
    assert!(cursor.next_back().is_none());
}

#[test]
fn test_cloned_cursor_restarts_from_clone_point() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);
    for i in 0..3 {
        node.set_sup(i, b"v", tag::SUP).unwrap();
    }

    let mut cursor = node.sup_entries(tag::SUP);
    cursor.next();
    let rest: Vec<NodeIndex> = cursor.clone().map(|e| e.unwrap().0).collect();

    assert_eq!(rest, vec![1, 2]);
    assert_eq!(cursor.count(), 2);
}

#[test]
fn test_empty_array_yields_nothing() {
    let store = MemoryStore::new();
    let node = fresh_node(&store);

    assert!(node.sup_entries(tag::SUP).next().is_none());
    assert!(node.hash_entries(tag::HASH).next_back().is_none());
}

// =============================================================================
// Node Iteration Tests
// =============================================================================

#[test]
fn test_all_nodes_in_id_order() {
    let store = MemoryStore::new();
    let high = Node::open(&store, 0x3000);
    let low = Node::open(&store, 0x1000);
    high.set_value(b"h").unwrap();
    low.set_sup(1, b"a", tag::SUP).unwrap();
    low.set_sup(2, b"b", tag::SUP).unwrap();
    low.set_hash("k", b"v", tag::HASH).unwrap();

    let ids: Vec<NodeIndex> = Node::all(&store).map(|n| n.unwrap().id()).collect();
    assert_eq!(ids, vec![0x1000, 0x3000]);

    let reversed: Vec<NodeIndex> = Node::all(&store).rev().map(|n| n.unwrap().id()).collect();
    assert_eq!(reversed, vec![0x3000, 0x1000]);
}

#[test]
fn test_all_nodes_skips_killed() {
    let store = MemoryStore::new();
    let (a, _) = Node::create(&store, Some("a")).unwrap();
    let (b, _) = Node::create(&store, Some("b")).unwrap();
    a.kill().unwrap();

    let ids: Vec<NodeIndex> = Node::all(&store).map(|n| n.unwrap().id()).collect();

    assert_eq!(ids, vec![b.id()]);
}
