//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean WAL (no corruption)
//! - Recovery from an empty WAL
//! - Recovery with partial writes (truncated tail)
//! - Recovery with corrupted entries (CRC mismatch)
//! - Verify mode (stats only, file untouched)

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use areadb::config::WalSyncStrategy;
use areadb::wal::{Operation, WalEntry, WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Vec<Operation> {
    vec![Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }]
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(put(&format!("key{}", i), &format!("value{}", i)))
            .unwrap();
    }
}

/// Write raw frames directly to a file (for crafting corruption)
fn write_raw(path: &PathBuf, chunks: &[&[u8]]) {
    let mut file = File::create(path).unwrap();
    for chunk in chunks {
        file.write_all(chunk).unwrap();
    }
    file.sync_all().unwrap();
}

fn corrupted_frame(lsn: u64) -> Vec<u8> {
    let mut bytes = WalEntry::new(lsn, put("bad", "frame")).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    bytes
}

// =============================================================================
// Recover: Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_multiple_entries_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, (i + 1) as u64);
    }
}

// =============================================================================
// Recover: Partial Write Tests
// =============================================================================

#[test]
fn test_recover_partial_header_truncates_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, put("k", "v")).serialize().unwrap();
    write_raw(&wal_path, &[&good, &[0u8; 8]]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(
        std::fs::metadata(&wal_path).unwrap().len(),
        good.len() as u64
    );
}

#[test]
fn test_recover_partial_data_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, put("k", "v")).serialize().unwrap();
    let mut torn = WalEntry::new(2, put("k2", "v2")).serialize().unwrap();
    torn.truncate(20);
    write_raw(&wal_path, &[&good, &torn]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 0);
    assert!(result.was_truncated);
}

// =============================================================================
// Recover: Corruption Tests (CRC mismatch)
// =============================================================================

#[test]
fn test_recover_skips_corrupted_entry_and_continues() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = WalEntry::new(1, put("k1", "v1")).serialize().unwrap();
    let bad = corrupted_frame(2);
    let third = WalEntry::new(3, put("k3", "v3")).serialize().unwrap();
    write_raw(&wal_path, &[&first, &bad, &third]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.iter().map(|e| e.lsn).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 3);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_corruption_at_first_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw(&wal_path, &[&corrupted_frame(1)]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 0);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, put("k", "v")).serialize().unwrap();
    write_raw(&wal_path, &[&good, &[0u8; 5]]);
    let before = std::fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 1);
    assert!(result.was_truncated);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), before);
}

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 20);

    let (entries, recover_result) = WalRecovery::recover(&wal_path).unwrap();
    let verify_result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(entries.len(), recover_result.entries_recovered as usize);
    assert_eq!(recover_result.entries_recovered, verify_result.entries_recovered);
    assert_eq!(recover_result.entries_corrupted, verify_result.entries_corrupted);
    assert_eq!(recover_result.last_lsn, verify_result.last_lsn);
    assert_eq!(recover_result.was_truncated, verify_result.was_truncated);
}
