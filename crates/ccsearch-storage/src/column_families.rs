//! Column family definitions for RocksDB.
//!
//! - commit_log: append-only signed documents keyed by sequence (Zstd compressed)
//! - checkpoints: small cursor values, overwritten in place

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for the commit log
pub const CF_COMMIT_LOG: &str = "commit_log";

/// Column family name for sync cursors
pub const CF_CHECKPOINTS: &str = "checkpoints";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_COMMIT_LOG, CF_CHECKPOINTS];

fn commit_log_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_COMMIT_LOG, commit_log_options()),
        ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Options::default()),
    ]
}
