//! Log to index synchronization for cc-search.
//!
//! ## Key Components
//!
//! - [`SyncEngine`]: runs single-flight sync cycles over the commit log
//! - [`LogSource`] / [`CheckpointStore`]: where entries and the cursor live
//! - [`TransformerRegistry`]: maps document types to searchable records
//! - [`SyncGuard`]: at-most-one-cycle permit
//!
//! A cycle fetches pages after the stored cursor, upserts the records each
//! page produces and only then persists the page's last sequence. Pages are
//! separated by a configurable delay to bound load on the search engine.

mod blocking;
pub mod checkpoint;
pub mod error;
pub mod guard;
pub mod source;
pub mod sync;
pub mod transform;

pub use checkpoint::{CheckpointStore, StorageCheckpointStore};
pub use error::IndexingError;
pub use guard::{SyncGuard, SyncPermit};
pub use source::{LogSource, StorageLogSource};
pub use sync::{CycleReport, CycleStatus, SyncConfig, SyncEngine};
pub use transform::{MessageTransformer, RecordTransformer, TransformerRegistry};
