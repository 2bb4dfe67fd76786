//! # ccsearch-types
//!
//! Shared domain types for the cc-search system.
//!
//! This crate defines the data structures used throughout the workspace:
//! - Log entries: raw, immutable rows of the append-only commit log
//! - Document envelopes: the generic parsed shape of a signed document
//! - Searchable records: the flat unit written into the search index
//! - Content identifiers (CDID): stable, content-addressed record ids
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use ccsearch_types::{derive_cdid, LogEntry};
//!
//! let entry = LogEntry::new(1, r#"{"type":"message"}"#);
//! let id = derive_cdid(entry.payload(), 1_700_000_000_000);
//! assert_eq!(id.len(), 26);
//! ```

pub mod cdid;
pub mod config;
pub mod document;
pub mod error;
pub mod log;
pub mod record;

pub use cdid::{derive_cdid, Cdid, CDID_HASH_LEN};
pub use config::{SearchBackend, SearchSettings, Settings, SyncSettings};
pub use document::{DocumentEnvelope, MessageDocument};
pub use error::CcSearchError;
pub use log::LogEntry;
pub use record::{RecordType, SearchableRecord};
