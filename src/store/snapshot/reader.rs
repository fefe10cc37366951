//! Snapshot Reader
//!
//! Validates a snapshot file and loads its entries.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{AreaDbError, Result};
use crate::store::Entry;

use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for snapshot files
pub struct SnapshotReader {
    file: BufReader<File>,
    entry_count: u64,
    /// Offset of the footer (end of the data block)
    data_end: u64,
    /// CRC recorded in the footer
    expected_crc: u32,
}

impl SnapshotReader {
    /// Open a snapshot and validate header and footer
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(AreaDbError::Storage(format!(
                "Snapshot too small: {} bytes",
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(AreaDbError::Storage(format!(
                "Invalid snapshot magic: expected ADBS, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(AreaDbError::Storage(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[6..14]);
        let entry_count = u64::from_le_bytes(count_bytes);

        let data_end = file_size - FOOTER_SIZE;
        file.seek(SeekFrom::Start(data_end))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let expected_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);

        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        Ok(Self {
            file: BufReader::new(file),
            entry_count,
            data_end,
            expected_crc,
        })
    }

    /// Number of entries recorded in the header
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Read every entry, verifying the data CRC and the entry count
    pub fn load(mut self) -> Result<Vec<Entry>> {
        let mut hasher = crc32fast::Hasher::new();
        // Every entry carries at least its 8-byte length header
        let max_entries = (self.data_end - HEADER_SIZE) / 8;
        let mut entries = Vec::with_capacity(self.entry_count.min(max_entries) as usize);
        let mut offset = HEADER_SIZE;

        while offset < self.data_end {
            if offset + 8 > self.data_end {
                return Err(AreaDbError::Storage(format!(
                    "Truncated snapshot entry header at offset {}",
                    offset
                )));
            }

            let mut lens = [0u8; 8];
            self.file.read_exact(&mut lens)?;
            let key_len = u32::from_le_bytes([lens[0], lens[1], lens[2], lens[3]]) as u64;
            let val_len = u32::from_le_bytes([lens[4], lens[5], lens[6], lens[7]]) as u64;

            let entry_end = offset + 8 + key_len + val_len;
            if entry_end > self.data_end {
                return Err(AreaDbError::Storage(format!(
                    "Snapshot entry at offset {} overruns data block",
                    offset
                )));
            }

            let mut key = vec![0u8; key_len as usize];
            self.file.read_exact(&mut key)?;
            let mut value = vec![0u8; val_len as usize];
            self.file.read_exact(&mut value)?;

            hasher.update(&lens);
            hasher.update(&key);
            hasher.update(&value);

            entries.push((key, value));
            offset = entry_end;
        }

        let actual_crc = hasher.finalize();
        if actual_crc != self.expected_crc {
            return Err(AreaDbError::Storage(format!(
                "Snapshot CRC mismatch: expected {:08x}, got {:08x}",
                self.expected_crc, actual_crc
            )));
        }

        if entries.len() as u64 != self.entry_count {
            return Err(AreaDbError::Storage(format!(
                "Snapshot entry count mismatch: header says {}, found {}",
                self.entry_count,
                entries.len()
            )));
        }

        Ok(entries)
    }
}
