//! Tests for WAL Writer
//!
//! These tests verify:
//! - Appending batches and LSN sequencing
//! - LSN continuation after reopening
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - Truncation
//! - Integration with reader

use std::path::PathBuf;

use areadb::config::WalSyncStrategy;
use areadb::wal::{Operation, WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(i: usize) -> Vec<Operation> {
    vec![Operation::Put {
        key: format!("key{}", i).into_bytes(),
        value: format!("value{}", i).into_bytes(),
    }]
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_write_single_entry() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer.append(put(1)).unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 1);
    assert!(writer.size() > 0);
}

#[test]
fn test_lsn_sequential() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    let lsns: Vec<u64> = (0..50).map(|i| writer.append(put(i)).unwrap()).collect();

    assert_eq!(lsns, (1..=50).collect::<Vec<u64>>());
}

#[test]
fn test_size_matches_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    for i in 0..10 {
        writer.append(put(i)).unwrap();
    }

    assert_eq!(writer.size(), std::fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_lsn_continues_after_reopen() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        for i in 0..5 {
            writer.append(put(i)).unwrap();
        }
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 5);
    assert_eq!(writer.append(put(5)).unwrap(), 6);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_n_entries_strategy_persists_after_sync() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer =
            WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 4 }).unwrap();
        for i in 0..10 {
            writer.append(put(i)).unwrap();
        }
        writer.sync().unwrap();
    }

    let reader = WalReader::open(&wal_path).unwrap();
    let entries: Vec<_> = reader.entries().collect::<Result<_, _>>().unwrap();
    assert_eq!(entries.len(), 10);
}

#[test]
fn test_zero_count_strategy_still_syncs() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 0 }).unwrap();

    assert_eq!(writer.append(put(0)).unwrap(), 1);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncate_empties_file_and_keeps_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    for i in 0..3 {
        writer.append(put(i)).unwrap();
    }
    writer.truncate().unwrap();

    assert_eq!(writer.size(), 0);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(put(3)).unwrap(), 4);

    let mut reader = WalReader::open(&wal_path).unwrap();
    let entry = reader.next_entry().unwrap().unwrap();
    assert_eq!(entry.lsn, 4);
    assert!(reader.next_entry().unwrap().is_none());
}

// =============================================================================
// Writer + Reader Integration
// =============================================================================

#[test]
fn test_written_batches_read_back_in_order() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer
            .append(vec![
                Operation::Put {
                    key: b"a".to_vec(),
                    value: b"1".to_vec(),
                },
                Operation::Delete { key: b"b".to_vec() },
            ])
            .unwrap();
        writer.append(put(9)).unwrap();
    }

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(entries[0].operations.len(), 2);
    assert!(matches!(entries[0].operations[1], Operation::Delete { .. }));
    assert_eq!(entries[1].lsn, 2);
}
