//! Tantivy index management for the embedded engine.
//!
//! Handles index creation, opening, and the attribute settings persisted
//! next to the index files.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::schema::{build_record_schema, RecordSchema};

/// Default memory budget for IndexWriter (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// File holding the declared attribute settings
const SETTINGS_FILE: &str = "ccsearch-settings.json";

/// Attribute declarations, mirroring the Meilisearch index settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    #[serde(default)]
    pub filterable_attributes: Vec<String>,
    #[serde(default)]
    pub sortable_attributes: Vec<String>,
}

/// Embedded index configuration
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Path to index directory
    pub index_path: PathBuf,
    /// Memory budget for writer in MB
    pub writer_memory_mb: usize,
}

impl SearchIndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }

    /// Check if an index exists at the configured path
    pub fn exists(&self) -> bool {
        self.index_path.join("meta.json").exists()
    }
}

/// An open Tantivy index with its single writer, reader and settings.
pub struct SearchIndex {
    index: Index,
    schema: RecordSchema,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    settings: RwLock<IndexSettings>,
    path: PathBuf,
}

impl SearchIndex {
    /// Create a new index. Fails if one already exists at the path.
    pub fn create(config: &SearchIndexConfig) -> Result<Self, SearchError> {
        info!(path = ?config.index_path, "Creating new index");
        std::fs::create_dir_all(&config.index_path)?;
        let schema = build_record_schema();
        let index = Index::create_in_dir(&config.index_path, schema.schema().clone())?;
        save_settings(&config.index_path, &IndexSettings::default())?;
        Self::from_index(index, config)
    }

    /// Open an existing index.
    pub fn open(config: &SearchIndexConfig) -> Result<Self, SearchError> {
        if !config.exists() {
            return Err(SearchError::IndexNotFound(
                config.index_path.display().to_string(),
            ));
        }
        debug!(path = ?config.index_path, "Opening existing index");
        let index = Index::open_in_dir(&config.index_path)?;
        Self::from_index(index, config)
    }

    fn from_index(index: Index, config: &SearchIndexConfig) -> Result<Self, SearchError> {
        let schema = RecordSchema::from_schema(index.schema())?;
        // Reloaded explicitly after each commit so upserts are visible on return.
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer(config.writer_memory_mb * 1024 * 1024)?;
        let settings = load_settings(&config.index_path)?;

        info!(path = ?config.index_path, "Opened search index");

        Ok(Self {
            index,
            schema,
            reader,
            writer: Mutex::new(writer),
            settings: RwLock::new(settings),
            path: config.index_path.clone(),
        })
    }

    /// Get the record schema
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Get the underlying Tantivy index
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn writer(&self) -> &Mutex<IndexWriter> {
        &self.writer
    }

    /// Get the index path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current attribute settings
    pub fn settings(&self) -> Result<IndexSettings, SearchError> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    /// Apply a change to the settings and persist it.
    pub fn update_settings(
        &self,
        update: impl FnOnce(&mut IndexSettings),
    ) -> Result<(), SearchError> {
        let mut settings = self
            .settings
            .write()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;
        let mut next = settings.clone();
        update(&mut next);
        save_settings(&self.path, &next)?;
        *settings = next;
        Ok(())
    }
}

fn load_settings(dir: &Path) -> Result<IndexSettings, SearchError> {
    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(IndexSettings::default());
    }
    let raw = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Write via a temp file and rename so a crash never leaves a torn file.
fn save_settings(dir: &Path, settings: &IndexSettings) -> Result<(), SearchError> {
    let tmp = dir.join(format!("{}.tmp", SETTINGS_FILE));
    std::fs::write(&tmp, serde_json::to_vec_pretty(settings)?)?;
    std::fs::rename(&tmp, dir.join(SETTINGS_FILE))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_new_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = SearchIndexConfig::new(temp_dir.path());
        assert!(!config.exists());

        let index = SearchIndex::create(&config).unwrap();
        assert!(config.exists());
        assert_eq!(index.settings().unwrap(), IndexSettings::default());
    }

    #[test]
    fn test_open_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let config = SearchIndexConfig::new(temp_dir.path().join("missing"));
        assert!(matches!(
            SearchIndex::open(&config),
            Err(SearchError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_settings_persist_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = SearchIndexConfig::new(temp_dir.path()).with_memory_mb(15);

        {
            let index = SearchIndex::create(&config).unwrap();
            index
                .update_settings(|s| s.sortable_attributes = vec!["signedAt".into()])
                .unwrap();
        }

        let index = SearchIndex::open(&config).unwrap();
        assert_eq!(
            index.settings().unwrap().sortable_attributes,
            vec!["signedAt".to_string()]
        );
    }
}
