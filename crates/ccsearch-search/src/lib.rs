//! # ccsearch-search
//!
//! The search engine seam for cc-search.
//!
//! - [`SearchEngine`]: the operations the sync and query paths need from an index
//! - [`MeiliClient`]: Meilisearch over its REST API
//! - [`EmbeddedEngine`]: a local Tantivy index with Meilisearch-like attribute rules
//! - [`reconcile_index`]: startup creation and attribute reconciliation

pub mod document;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod index;
pub mod indexer;
pub mod meili;
pub mod reconcile;
pub mod schema;
pub mod searcher;

pub use embedded::EmbeddedEngine;
pub use engine::{Filter, Hit, SearchEngine, SearchQuery, SearchResponse, SortOrder, SortSpec};
pub use error::SearchError;
pub use index::{IndexSettings, SearchIndex, SearchIndexConfig};
pub use meili::{MeiliClient, MeiliConfig};
pub use reconcile::{reconcile_index, DeclaredAttributes, ReconcileReport};
pub use schema::{build_record_schema, RecordSchema};
pub use searcher::MAX_TOTAL_HITS;
