//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{AreaDbError, Result};

use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    file: File,
    path: PathBuf,
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Current file size in bytes
    size: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// LSNs continue after the last valid entry already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let current_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            file,
            path: path.to_path_buf(),
            current_lsn,
            sync_strategy,
            unsynced: 0,
            size,
        })
    }

    /// Append one entry holding `operations`; returns its LSN
    pub fn append(&mut self, operations: Vec<Operation>) -> Result<u64> {
        let lsn = self.current_lsn + 1;
        let frame = WalEntry::new(lsn, operations).serialize()?;

        self.file.write_all(&frame).map_err(|e| {
            AreaDbError::WalWrite(format!("append LSN {} to {}: {}", lsn, self.path.display(), e))
        })?;

        self.current_lsn = lsn;
        self.size += frame.len() as u64;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry (their effects are durable elsewhere)
    ///
    /// LSNs keep increasing across truncation.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.size = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Current file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}
