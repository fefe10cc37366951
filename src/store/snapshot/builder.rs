//! Snapshot Builder
//!
//! Writes sorted key-value entries to a new snapshot file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{AreaDbError, Result};

use super::{SnapshotMeta, HEADER_SIZE, MAGIC, VERSION};

/// Builder for creating a snapshot from sorted entries
pub struct SnapshotBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of entries written
    entry_count: u64,
    /// Last key written, to enforce ordering
    last_key: Option<Vec<u8>>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder
    ///
    /// Writes the header immediately; call `add()` in sorted key order,
    /// then `finish()` to write the footer.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Header (entry_count placeholder, patched in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            last_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair (must be called in strictly ascending key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(AreaDbError::Storage(format!(
                    "Snapshot keys out of order: {:?} after {:?}",
                    key, last
                )));
            }
        }

        let key_len_bytes = (key.len() as u32).to_le_bytes();
        let val_len_bytes = (value.len() as u32).to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;
        self.writer.write_all(value)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);
        self.data_hasher.update(value);

        self.last_key = Some(key.to_vec());
        self.entry_count += 1;
        Ok(())
    }

    /// Finish building: write footer, patch the entry count, sync
    pub fn finish(mut self) -> Result<SnapshotMeta> {
        let data_crc = self.data_hasher.finalize();

        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?; // Padding for alignment
        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            AreaDbError::Storage(format!("Failed to flush snapshot: {}", e))
        })?;
        file.seek(SeekFrom::Start(HEADER_SIZE - 8))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        Ok(SnapshotMeta {
            path: self.path,
            entry_count: self.entry_count,
            file_size,
        })
    }
}
