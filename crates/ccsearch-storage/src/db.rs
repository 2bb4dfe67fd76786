//! RocksDB wrapper for cc-search storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Sequenced appends to the commit log and ordered range reads
//! - Checkpoint get/put
//! - Admin operations (stats, flush, compaction)
//!
//! A store is opened either as the exclusive read-write primary or as a
//! follower: a RocksDB secondary instance that takes no lock, rejects
//! writes and sees the primary's writes after [`Storage::catch_up`].

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use ccsearch_types::LogEntry;

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_CHECKPOINTS, CF_COMMIT_LOG};
use crate::error::StorageError;
use crate::keys::{CheckpointKey, LogKey};

/// Main storage interface for cc-search
pub struct Storage {
    db: DB,
    /// Next sequence handed out by `append`; sequences start at 1
    next_sequence: AtomicU64,
    follower: bool,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        // Append-only workload
        db_opts.set_compaction_style(rocksdb::DBCompactionStyle::Universal);
        db_opts.set_max_background_jobs(4);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;

        let next_sequence = Self::load_last_sequence(&db)?.map_or(1, |seq| seq + 1);
        debug!(next_sequence, "Commit log opened");

        Ok(Self {
            db,
            next_sequence: AtomicU64::new(next_sequence),
            follower: false,
        })
    }

    /// Open a read-only follower of the store at `primary`.
    ///
    /// `secondary` holds the follower's own info logs and must not be shared
    /// with another open follower. A missing primary is created first so
    /// the follower can start before any producer has written.
    pub fn open_follower(primary: &Path, secondary: &Path) -> Result<Self, StorageError> {
        if !primary.join("CURRENT").exists() {
            drop(Self::open(primary)?);
        }
        info!("Following storage at {:?}", primary);

        let mut db_opts = Options::default();
        // Required for secondary instances
        db_opts.set_max_open_files(-1);

        let db = DB::open_cf_descriptors_as_secondary(
            &db_opts,
            primary,
            secondary,
            build_cf_descriptors(),
        )?;

        Ok(Self {
            db,
            next_sequence: AtomicU64::new(0),
            follower: true,
        })
    }

    pub fn is_follower(&self) -> bool {
        self.follower
    }

    /// Replay the primary's new writes. No-op on a primary.
    pub fn catch_up(&self) -> Result<(), StorageError> {
        if self.follower {
            self.db.try_catch_up_with_primary()?;
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StorageError> {
        if self.follower {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Highest sequence present in the commit log
    fn load_last_sequence(db: &DB) -> Result<Option<u64>, StorageError> {
        let cf = db
            .cf_handle(CF_COMMIT_LOG)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_COMMIT_LOG.to_string()))?;

        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            return Ok(Some(LogKey::from_bytes(&key)?.sequence));
        }
        Ok(None)
    }

    // ==================== Commit Log Methods ====================

    /// Append a document at the next sequence. Returns the assigned sequence.
    pub fn append(&self, document: impl AsRef<[u8]>) -> Result<u64, StorageError> {
        self.ensure_writable()?;
        let cf = self.cf(CF_COMMIT_LOG)?;
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.db
            .put_cf(cf, LogKey::new(sequence).to_bytes(), document.as_ref())?;
        debug!(sequence, "Appended log entry");
        Ok(sequence)
    }

    /// Append several documents atomically. Returns the assigned sequences.
    pub fn append_batch<S: AsRef<[u8]>>(&self, documents: &[S]) -> Result<Vec<u64>, StorageError> {
        self.ensure_writable()?;
        let cf = self.cf(CF_COMMIT_LOG)?;
        let count = documents.len() as u64;
        let first = self.next_sequence.fetch_add(count, Ordering::SeqCst);

        let mut batch = WriteBatch::default();
        let mut sequences = Vec::with_capacity(documents.len());
        for (offset, document) in documents.iter().enumerate() {
            let sequence = first + offset as u64;
            batch.put_cf(cf, LogKey::new(sequence).to_bytes(), document.as_ref());
            sequences.push(sequence);
        }

        self.db.write(batch)?;
        debug!(count, first, "Appended log batch");
        Ok(sequences)
    }

    /// Write a document at an explicit sequence. Later `append` calls continue
    /// after the highest sequence written, which leaves gaps when callers skip.
    pub fn put_entry(&self, sequence: u64, document: impl AsRef<[u8]>) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let cf = self.cf(CF_COMMIT_LOG)?;
        self.db
            .put_cf(cf, LogKey::new(sequence).to_bytes(), document.as_ref())?;
        self.next_sequence
            .fetch_max(sequence.saturating_add(1), Ordering::SeqCst);
        Ok(())
    }

    /// Get up to `limit` entries with `sequence > after`, ascending.
    pub fn get_entries_after(&self, after: u64, limit: usize) -> Result<Vec<LogEntry>, StorageError> {
        let Some(start) = after.checked_add(1) else {
            return Ok(Vec::new());
        };

        let cf = self.cf(CF_COMMIT_LOG)?;
        let start_key = LogKey::new(start).to_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start_key, Direction::Forward));

        let mut results = Vec::new();
        for item in iter.take(limit) {
            let (key, value) = item?;
            let log_key = LogKey::from_bytes(&key)?;
            // Values are returned as stored; decoding is the reader's concern
            results.push(LogEntry::new(log_key.sequence, value.to_vec()));
        }

        Ok(results)
    }

    /// Highest sequence written so far
    pub fn last_sequence(&self) -> Result<Option<u64>, StorageError> {
        Self::load_last_sequence(&self.db)
    }

    // ==================== Checkpoint Methods ====================

    /// Store a checkpoint value
    pub fn put_checkpoint(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let cf = self.cf(CF_CHECKPOINTS)?;
        self.db.put_cf(cf, CheckpointKey::new(name).to_bytes(), value)?;
        Ok(())
    }

    /// Get a checkpoint value
    pub fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(CF_CHECKPOINTS)?;
        Ok(self.db.get_cf(cf, CheckpointKey::new(name).to_bytes())?)
    }

    /// Remove a checkpoint value
    pub fn delete_checkpoint(&self, name: &str) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let cf = self.cf(CF_CHECKPOINTS)?;
        self.db.delete_cf(cf, CheckpointKey::new(name).to_bytes())?;
        Ok(())
    }

    // ===== Admin Operations =====

    /// Flush all column families to disk. Followers have nothing to flush.
    pub fn flush(&self) -> Result<(), StorageError> {
        if self.follower {
            return Ok(());
        }
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        self.ensure_writable()?;
        info!("Starting full compaction...");
        self.db.compact_range::<&[u8], &[u8]>(None, None);
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            log_entry_count: self.count_cf_entries(self.cf(CF_COMMIT_LOG)?)?,
            last_sequence: self.last_sequence()?,
            checkpoint_count: self.count_cf_entries(self.cf(CF_CHECKPOINTS)?)?,
            disk_usage_bytes: self.disk_usage(),
        })
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn disk_usage(&self) -> u64 {
        std::fs::read_dir(self.db.path())
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|entry| entry.metadata().ok())
                    .map(|metadata| metadata.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Statistics about the storage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of commit log entries
    pub log_entry_count: u64,
    /// Highest sequence in the commit log
    pub last_sequence: Option<u64>,
    /// Number of stored checkpoints
    pub checkpoint_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
