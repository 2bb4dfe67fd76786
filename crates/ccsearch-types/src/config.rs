//! Configuration loading for cc-search.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The config file lives at ~/.config/cc-search/config.{toml,yaml,json}.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CcSearchError;

const APP_NAME: &str = "cc-search";

/// Which search engine implementation backs the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    /// Remote Meilisearch instance over HTTP
    #[default]
    Meilisearch,
    /// Local Tantivy index on disk
    Embedded,
}

/// Search engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub backend: SearchBackend,

    /// Meilisearch base URL (e.g. http://localhost:7700)
    #[serde(default)]
    pub url: Option<String>,

    /// Meilisearch API key (loaded from env var, not stored in config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Index name
    #[serde(default = "default_index")]
    pub index: String,

    /// Directory of the embedded index
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// How long to wait for an enqueued Meilisearch task
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

fn default_index() -> String {
    "ccsearch".to_string()
}

fn default_index_path() -> String {
    data_dir_path("search-index", "./search-index")
}

fn default_task_timeout_secs() -> u64 {
    30
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            url: None,
            api_key: None,
            index: default_index(),
            index_path: default_index_path(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

/// Sync loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between sync cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum log entries fetched per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pause between consecutive full pages
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Checkpoint store key holding the cursor
    #[serde(default = "default_checkpoint_key")]
    pub checkpoint_key: String,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_page_size() -> usize {
    512
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_checkpoint_key() -> String {
    "ccsearch:readitr".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            checkpoint_key: default_checkpoint_key(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB commit log
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path to the checkpoint store; `<db_path>-checkpoints` when unset.
    /// Must differ from `db_path`, which is only ever followed read-only.
    #[serde(default)]
    pub checkpoint_path: Option<String>,

    /// HTTP listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

fn data_dir_path(leaf: &str, fallback: &str) -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().join(leaf))
        .unwrap_or_else(|| PathBuf::from(fallback))
        .to_string_lossy()
        .to_string()
}

fn default_db_path() -> String {
    data_dir_path("db", "./data")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            checkpoint_path: None,
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            search: SearchSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/cc-search/config)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CCSEARCH_*, nested keys split on `__`)
    /// 5. Legacy variables MEILISEARCH_URL, MEILISEARCH_KEY, MEILISEARCH_IDX, PORT
    ///
    /// CLI flags should be applied by the caller after this returns, followed
    /// by [`Settings::validate`] for commands that talk to the search engine.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, CcSearchError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(config_err)?
            .set_default("host", default_host())
            .map_err(config_err)?
            .set_default("port", default_port() as i64)
            .map_err(config_err)?
            .set_default("log_level", default_log_level())
            .map_err(config_err)?
            .set_default("search.index", default_index())
            .map_err(config_err)?
            .set_default("search.index_path", default_index_path())
            .map_err(config_err)?
            .set_default("sync.interval_secs", default_interval_secs() as i64)
            .map_err(config_err)?
            .set_default("sync.page_size", default_page_size() as i64)
            .map_err(config_err)?
            .set_default("sync.page_delay_ms", default_page_delay_ms() as i64)
            .map_err(config_err)?
            .set_default("sync.checkpoint_key", default_checkpoint_key())
            .map_err(config_err)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CCSEARCH_PORT, CCSEARCH_SEARCH__URL, CCSEARCH_SYNC__PAGE_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("CCSEARCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder = builder
            .set_override_option("search.url", env_var("MEILISEARCH_URL"))
            .map_err(config_err)?
            .set_override_option("search.api_key", env_var("MEILISEARCH_KEY"))
            .map_err(config_err)?
            .set_override_option("search.index", env_var("MEILISEARCH_IDX"))
            .map_err(config_err)?
            .set_override_option("port", env_var("PORT"))
            .map_err(config_err)?;

        let settings: Settings = builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)?;

        Ok(settings)
    }

    /// Reject settings the sync loop or engine wiring cannot run with.
    pub fn validate(&self) -> Result<(), CcSearchError> {
        if self.sync.page_size == 0 {
            return Err(CcSearchError::Config("sync.page_size must be > 0".into()));
        }
        if self.sync.interval_secs == 0 {
            return Err(CcSearchError::Config("sync.interval_secs must be > 0".into()));
        }
        if self.expanded_checkpoint_path() == self.expanded_db_path() {
            return Err(CcSearchError::Config(
                "checkpoint_path must differ from db_path".into(),
            ));
        }
        if self.search.backend == SearchBackend::Meilisearch
            && self.search.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(CcSearchError::Config(
                "search.url is required for the meilisearch backend".into(),
            ));
        }
        Ok(())
    }

    /// Socket address for the HTTP server
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Checkpoint store path, defaulting to a sibling of the commit log
    pub fn expanded_checkpoint_path(&self) -> PathBuf {
        match &self.checkpoint_path {
            Some(path) => expand_home(path),
            None => {
                let db_path = self.expanded_db_path();
                let name = db_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "db".to_string());
                db_path.with_file_name(format!("{}-checkpoints", name))
            }
        }
    }

    /// Expand ~ in search.index_path
    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.search.index_path)
    }
}

fn config_err(e: config::ConfigError) -> CcSearchError {
    CcSearchError::Config(e.to_string())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    Path::new(path).to_path_buf()
}
