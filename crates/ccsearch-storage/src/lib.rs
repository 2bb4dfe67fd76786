//! Storage layer for cc-search.
//!
//! Provides RocksDB-backed storage with:
//! - An append-only commit log keyed by zero-padded sequence for ordered range scans
//! - A checkpoint column family holding durable cursors
//! - Admin helpers (stats, flush, compaction)

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{CheckpointKey, LogKey};
