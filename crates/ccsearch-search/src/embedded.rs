//! [`SearchEngine`] backed by a local Tantivy index.
//!
//! The index is opened lazily: until `create_index` runs (or an existing
//! index is found on disk) every data operation reports `IndexNotFound`.
//! Tantivy calls are blocking, so they run on the blocking thread pool.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::info;

use ccsearch_types::SearchableRecord;

use crate::engine::{SearchEngine, SearchQuery, SearchResponse};
use crate::error::SearchError;
use crate::index::{SearchIndex, SearchIndexConfig};
use crate::indexer::upsert_records;
use crate::searcher::search_records;

pub struct EmbeddedEngine {
    name: String,
    config: SearchIndexConfig,
    index: RwLock<Option<Arc<SearchIndex>>>,
}

impl EmbeddedEngine {
    /// Bind to the index directory, opening it if it already exists.
    pub fn open(name: impl Into<String>, config: SearchIndexConfig) -> Result<Self, SearchError> {
        let index = if config.exists() {
            Some(Arc::new(SearchIndex::open(&config)?))
        } else {
            None
        };
        Ok(Self {
            name: name.into(),
            config,
            index: RwLock::new(index),
        })
    }

    fn current(&self) -> Result<Arc<SearchIndex>, SearchError> {
        self.index
            .read()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?
            .clone()
            .ok_or_else(|| SearchError::IndexNotFound(self.name.clone()))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, SearchError>
where
    F: FnOnce() -> Result<T, SearchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SearchError::Background(e.to_string()))?
}

#[async_trait]
impl SearchEngine for EmbeddedEngine {
    fn index_name(&self) -> &str {
        &self.name
    }

    async fn index_exists(&self) -> Result<bool, SearchError> {
        Ok(self.current().is_ok())
    }

    async fn create_index(&self) -> Result<(), SearchError> {
        let mut slot = self
            .index
            .write()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;
        if slot.is_none() {
            *slot = Some(Arc::new(SearchIndex::create(&self.config)?));
            info!(index = %self.name, "Created embedded index");
        }
        Ok(())
    }

    async fn filterable_attributes(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.current()?.settings()?.filterable_attributes)
    }

    async fn set_filterable_attributes(&self, attributes: &[String]) -> Result<(), SearchError> {
        let attributes = attributes.to_vec();
        self.current()?
            .update_settings(|s| s.filterable_attributes = attributes)
    }

    async fn sortable_attributes(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.current()?.settings()?.sortable_attributes)
    }

    async fn set_sortable_attributes(&self, attributes: &[String]) -> Result<(), SearchError> {
        let attributes = attributes.to_vec();
        self.current()?
            .update_settings(|s| s.sortable_attributes = attributes)
    }

    async fn add_documents(&self, records: &[SearchableRecord]) -> Result<(), SearchError> {
        let index = self.current()?;
        let records = records.to_vec();
        run_blocking(move || upsert_records(&index, &records).map(|_| ())).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let index = self.current()?;
        let query = query.clone();
        run_blocking(move || search_records(&index, &query)).await
    }
}
