//! Durable Backing Store
//!
//! Coordinates the in-memory map, the write-ahead log and the snapshot file.
//!
//! ## Responsibilities
//! - Log every batch to the WAL before applying it
//! - Replay snapshot + WAL on open (crash recovery)
//! - Write a snapshot and truncate the WAL on `save()` or when the WAL grows
//!   past `wal_size_limit`

use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::wal::{WalRecovery, WalWriter};

use super::snapshot::{SnapshotBuilder, SnapshotMeta, SnapshotReader};
use super::{BackingStore, Entry, MemoryStore, WriteBatch};

/// Backing Store persisted under a data directory
///
/// ## Concurrency Model
/// - Reads go straight to the `MemoryStore` (internal RwLock)
/// - Writes hold the `wal` mutex across append + apply, so the log order is
///   the apply order
pub struct FileStore {
    /// Store configuration
    config: Config,

    /// Current contents
    memory: MemoryStore,

    /// Write-ahead log; its lock also serializes writers
    wal: Mutex<WalWriter>,

    snapshot_path: PathBuf,
}

impl FileStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_FILENAME: &'static str = "snapshot.adb";
    const SNAPSHOT_TMP_FILENAME: &'static str = "snapshot.adb.tmp";

    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Load the snapshot if present
    /// 3. Replay the WAL on top of it
    /// 4. If anything was replayed, save a fresh snapshot and truncate the WAL
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let snapshot_path = config.data_dir.join(Self::SNAPSHOT_FILENAME);

        let memory = if snapshot_path.exists() {
            let entries = SnapshotReader::open(&snapshot_path)?.load()?;
            info!(path = %snapshot_path.display(), entries = entries.len(), "loaded snapshot");
            MemoryStore::from_entries(entries)
        } else {
            MemoryStore::new()
        };

        let mut replayed = 0u64;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 || result.was_truncated {
                info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    truncated = result.was_truncated,
                    "WAL recovery"
                );
            }
            for entry in entries {
                memory.apply(&entry.operations);
                replayed += 1;
            }
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        let store = Self {
            config,
            memory,
            wal: Mutex::new(wal),
            snapshot_path,
        };

        // Recovered data becomes durable in the snapshot before the log goes.
        if replayed > 0 {
            store.save()?;
        }

        Ok(store)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Write a snapshot of the current contents and truncate the WAL
    pub fn save(&self) -> Result<SnapshotMeta> {
        let mut wal = self.wal.lock();
        self.save_locked(&mut wal)
    }

    /// Called with the WAL lock held
    fn save_locked(&self, wal: &mut WalWriter) -> Result<SnapshotMeta> {
        let tmp_path = self.config.data_dir.join(Self::SNAPSHOT_TMP_FILENAME);

        let mut builder = SnapshotBuilder::new(&tmp_path)?;
        for (key, value) in self.memory.entries() {
            builder.add(&key, &value)?;
        }
        let mut meta = builder.finish()?;

        fs::rename(&tmp_path, &self.snapshot_path)?;
        meta.path = self.snapshot_path.clone();

        wal.truncate()?;

        info!(
            path = %meta.path.display(),
            entries = meta.entry_count,
            bytes = meta.file_size,
            "saved snapshot"
        );
        Ok(meta)
    }

    /// Save and release the store
    pub fn close(self) -> Result<()> {
        self.save()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current WAL size in bytes
    pub fn wal_size(&self) -> u64 {
        self.wal.lock().size()
    }

    /// LSN of the last logged batch
    pub fn current_lsn(&self) -> u64 {
        self.wal.lock().current_lsn()
    }

    /// Approximate size of the contents in bytes
    pub fn memory_size(&self) -> usize {
        self.memory.size()
    }
}

impl BackingStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.memory.get(key)
    }

    /// Steps:
    /// 1. Acquire the WAL lock
    /// 2. Append the whole batch as one entry (durability)
    /// 3. Apply it to memory
    /// 4. Save if the WAL outgrew its limit
    fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        let ops = batch.into_operations();
        let lsn = wal.append(ops.clone())?;
        self.memory.apply(&ops);

        if wal.size() >= self.config.wal_size_limit {
            debug!(lsn, wal_size = wal.size(), "WAL limit reached");
            // The batch is durable in the WAL; a failed snapshot leaves it for the next save
            if let Err(e) = self.save_locked(&mut wal) {
                warn!(lsn, error = %e, "Automatic snapshot failed, keeping WAL");
            }
        }

        Ok(())
    }

    fn first_in(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Option<Entry>> {
        self.memory.first_in(lo, hi)
    }

    fn last_in(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Option<Entry>> {
        self.memory.last_in(lo, hi)
    }

    fn scan(&self, lo: Bound<&[u8]>, hi: Bound<&[u8]>) -> Result<Vec<Entry>> {
        self.memory.scan(lo, hi)
    }

    fn key_count(&self) -> usize {
        self.memory.key_count()
    }

    /// Same as `save()`: snapshot + WAL truncation
    fn flush(&self) -> Result<()> {
        self.save().map(|_| ())
    }
}
