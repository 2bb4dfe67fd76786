//! Startup wiring: stores, search engine, reconciliation, sync and query.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use ccsearch_indexing::{
    StorageCheckpointStore, StorageLogSource, SyncConfig, SyncEngine, TransformerRegistry,
};
use ccsearch_search::{
    reconcile_index, DeclaredAttributes, EmbeddedEngine, MeiliClient, MeiliConfig,
    ReconcileReport, SearchEngine, SearchIndexConfig,
};
use ccsearch_service::QueryService;
use ccsearch_storage::Storage;
use ccsearch_types::{SearchBackend, Settings};

/// Stores used by the sync side.
///
/// The commit log is followed read-only and never locked, so producers
/// keep appending while the daemon runs. The checkpoint store is owned.
pub struct Stores {
    pub log: Arc<Storage>,
    pub checkpoints: Arc<Storage>,
}

impl Stores {
    pub fn open(settings: &Settings) -> Result<Self> {
        ensure_separate_paths(settings)?;
        let log = Arc::new(open_log_follower(settings)?);
        let checkpoints = Arc::new(open_checkpoints(settings)?);
        Ok(Self { log, checkpoints })
    }

    pub fn flush(&self) -> Result<()> {
        self.checkpoints
            .flush()
            .context("Failed to flush checkpoint store")
    }
}

fn ensure_separate_paths(settings: &Settings) -> Result<()> {
    if settings.expanded_checkpoint_path() == settings.expanded_db_path() {
        anyhow::bail!("checkpoint_path must differ from db_path");
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    Ok(())
}

fn open_storage(path: &Path) -> Result<Storage> {
    create_parent(path)?;
    Storage::open(path).with_context(|| format!("Failed to open storage at {:?}", path))
}

fn open_follower(path: &Path) -> Result<Storage> {
    create_parent(path)?;
    Storage::open_follower(path, &follower_dir())
        .with_context(|| format!("Failed to follow storage at {:?}", path))
}

/// Private scratch directory for one follower instance.
fn follower_dir() -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    std::env::temp_dir().join(format!(
        "ccsearch-follower-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Exclusive writer on the commit log. Fails while another writer holds it.
pub fn open_log_writer(settings: &Settings) -> Result<Storage> {
    open_storage(&settings.expanded_db_path())
}

/// Lock-free reader of the commit log.
pub fn open_log_follower(settings: &Settings) -> Result<Storage> {
    open_follower(&settings.expanded_db_path())
}

/// Exclusive owner of the checkpoint store.
pub fn open_checkpoints(settings: &Settings) -> Result<Storage> {
    open_storage(&settings.expanded_checkpoint_path())
        .context("Failed to open checkpoint store (is the daemon running?)")
}

/// Lock-free reader of the checkpoint store.
pub fn open_checkpoints_follower(settings: &Settings) -> Result<Storage> {
    open_follower(&settings.expanded_checkpoint_path())
}

/// Build the configured search engine, bound to `search.index`.
pub fn build_engine(settings: &Settings) -> Result<Arc<dyn SearchEngine>> {
    match settings.search.backend {
        SearchBackend::Meilisearch => {
            let config = MeiliConfig::from_settings(&settings.search)
                .context("search.url is required for the meilisearch backend")?;
            info!(url = %config.url, index = %config.index, "Using Meilisearch");
            let client = MeiliClient::new(config).context("Failed to build Meilisearch client")?;
            Ok(Arc::new(client))
        }
        SearchBackend::Embedded => {
            let path = settings.expanded_index_path();
            fs::create_dir_all(&path).context("Failed to create index directory")?;
            info!(path = ?path, index = %settings.search.index, "Using embedded index");
            let engine =
                EmbeddedEngine::open(settings.search.index.clone(), SearchIndexConfig::new(path))
                    .context("Failed to open embedded index")?;
            Ok(Arc::new(engine))
        }
    }
}

/// Fully wired service components.
pub struct App {
    pub settings: Settings,
    pub stores: Stores,
    pub engine: Arc<dyn SearchEngine>,
    pub sync: Arc<SyncEngine>,
    pub query: Arc<QueryService>,
    pub reconcile: ReconcileReport,
}

impl App {
    /// Open stores, connect the engine and reconcile its index settings.
    ///
    /// Any failure here is a startup failure.
    pub async fn build(settings: Settings) -> Result<Self> {
        let stores = Stores::open(&settings)?;
        let engine = build_engine(&settings)?;

        let reconcile = reconcile_index(engine.as_ref(), &DeclaredAttributes::default())
            .await
            .context("Failed to reconcile index settings")?;
        info!(
            index = engine.index_name(),
            created = reconcile.created,
            filterable_updated = reconcile.filterable_updated,
            sortable_updated = reconcile.sortable_updated,
            "Index reconciled"
        );

        let sync = Arc::new(SyncEngine::new(
            Arc::new(StorageLogSource::new(stores.log.clone())),
            Arc::new(StorageCheckpointStore::new(
                stores.checkpoints.clone(),
                settings.sync.checkpoint_key.clone(),
            )),
            engine.clone(),
            TransformerRegistry::default(),
            SyncConfig::from_settings(&settings.sync),
        ));
        let query = Arc::new(QueryService::new(engine.clone()));

        Ok(Self {
            settings,
            stores,
            engine,
            sync,
            query,
            reconcile,
        })
    }
}
