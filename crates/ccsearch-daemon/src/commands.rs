//! Command implementations for the cc-search daemon.
//!
//! Handles:
//! - start: reconcile, schedule sync cycles, serve HTTP until a signal
//! - sync: reconcile and run one cycle
//! - admin: cursor inspection, log seeding, storage statistics

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};

use ccsearch_indexing::{CheckpointStore, CycleReport, CycleStatus, StorageCheckpointStore};
use ccsearch_scheduler::{SchedulerConfig, SchedulerService};
use ccsearch_service::run_server_with_shutdown;
use ccsearch_storage::Storage;
use ccsearch_types::Settings;

use crate::app::{
    open_checkpoints, open_checkpoints_follower, open_log_follower, open_log_writer, App,
};
use crate::cli::{AdminCommands, CursorCommands};

/// CLI flags that override loaded settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub db_path: Option<String>,
    pub log_level: Option<String>,
}

/// Load layered settings, then apply CLI overrides (highest precedence).
pub fn load_settings(config_path: Option<&str>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(port) = overrides.port {
        settings.port = port;
    }
    if let Some(db_path) = &overrides.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(log_level) = &overrides.log_level {
        settings.log_level = log_level.clone();
    }

    Ok(settings)
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Log a cycle outcome at a level matching what happened.
pub fn log_report(report: &CycleReport) {
    match report.status {
        CycleStatus::Completed if report.upserted > 0 => info!(
            pages = report.pages,
            upserted = report.upserted,
            skipped = report.skipped_entries,
            malformed = report.malformed_entries,
            cursor = report.cursor_after,
            "Sync cycle completed"
        ),
        CycleStatus::Completed => debug!(cursor = report.cursor_after, "Sync cycle found nothing new"),
        CycleStatus::Skipped => debug!("Sync cycle skipped"),
        CycleStatus::Failed => warn!(
            cursor = report.cursor_after,
            error = report.error.as_deref().unwrap_or_default(),
            "Sync cycle failed"
        ),
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Start the daemon.
///
/// 1. Load configuration (defaults -> files -> env -> CLI)
/// 2. Open storage and the search engine, reconcile index settings
/// 3. Schedule the sync cycle every `sync.interval_secs`
/// 4. Serve HTTP until SIGINT/SIGTERM, then stop the scheduler
pub async fn start_daemon(config_path: Option<&str>, overrides: Overrides) -> Result<()> {
    let settings = load_settings(config_path, &overrides)?;
    settings.validate().context("Invalid configuration")?;
    init_logging(&settings.log_level)?;

    info!("cc-search starting...");
    info!("Configuration:");
    info!("  Database path: {}", settings.db_path);
    info!("  HTTP address: {}", settings.http_addr());
    info!("  Search backend: {:?}", settings.search.backend);
    info!("  Index: {}", settings.search.index);
    info!("  Log level: {}", settings.log_level);

    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .context("Invalid HTTP address")?;
    let interval = Duration::from_secs(settings.sync.interval_secs);

    let app = App::build(settings).await?;

    let mut scheduler = SchedulerService::new(SchedulerConfig::default());
    let sync = app.sync.clone();
    scheduler
        .add_interval_job("sync", interval, move |_token| {
            let sync = sync.clone();
            async move {
                let report = sync.run_cycle().await;
                log_report(&report);
            }
        })
        .context("Failed to register sync job")?;
    scheduler.start().context("Failed to start scheduler")?;

    let result = run_server_with_shutdown(addr, app.query.clone(), shutdown_signal()).await;

    if let Err(e) = scheduler.shutdown().await {
        warn!("Error during scheduler shutdown: {}", e);
    }
    app.stores.flush()?;

    result.map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

/// Reconcile the index and run exactly one sync cycle.
pub async fn run_sync_once(config_path: Option<&str>, overrides: Overrides) -> Result<CycleReport> {
    let settings = load_settings(config_path, &overrides)?;
    settings.validate().context("Invalid configuration")?;
    init_logging(&settings.log_level)?;

    let app = App::build(settings).await?;
    let report = app.sync.run_cycle().await;
    log_report(&report);
    app.stores.flush()?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to render report")?
    );
    if report.status == CycleStatus::Failed {
        anyhow::bail!(
            "Sync cycle failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(report)
}

/// Dispatch an admin command.
///
/// Reads go through lock-free followers so they work while the daemon
/// runs. `append` and `compact` take the commit log writer; cursor
/// changes take the checkpoint store, which the daemon owns while running.
pub async fn handle_admin(settings: &Settings, command: AdminCommands) -> Result<()> {
    let key = settings.sync.checkpoint_key.clone();

    match command {
        AdminCommands::Cursor { command } => match command {
            CursorCommands::Show => {
                let checkpoint =
                    StorageCheckpointStore::new(Arc::new(open_checkpoints_follower(settings)?), key);
                match checkpoint.load().await? {
                    Some(raw) => match raw.trim().parse::<u64>() {
                        Ok(cursor) => println!("Cursor ({}): {}", checkpoint.key(), cursor),
                        Err(_) => println!(
                            "Cursor ({}): {:?} (not an integer, sync starts from 0)",
                            checkpoint.key(),
                            raw
                        ),
                    },
                    None => println!("Cursor ({}): not set", checkpoint.key()),
                }
            }
            CursorCommands::Set { sequence } => {
                let storage = Arc::new(open_checkpoints(settings)?);
                let checkpoint = StorageCheckpointStore::new(storage.clone(), key);
                set_cursor(&checkpoint, sequence).await?;
                storage.flush().context("Failed to flush checkpoint store")?;
                println!("Cursor ({}) set to {}", checkpoint.key(), sequence);
            }
            CursorCommands::Reset => {
                let storage = open_checkpoints(settings)?;
                storage
                    .delete_checkpoint(&key)
                    .context("Failed to delete cursor")?;
                storage.flush().context("Failed to flush checkpoint store")?;
                println!("Cursor ({}) reset", key);
            }
        },
        AdminCommands::Append { file } => {
            let log = open_log_writer(settings)?;
            let sequences = append_file(&log, &file)?;
            log.flush().context("Failed to flush commit log")?;
            match (sequences.first(), sequences.last()) {
                (Some(first), Some(last)) => println!(
                    "Appended {} entries (sequences {}..={})",
                    sequences.len(),
                    first,
                    last
                ),
                _ => println!("Nothing to append"),
            }
        }
        AdminCommands::Stats => {
            let log = open_log_follower(settings)?;
            let checkpoint =
                StorageCheckpointStore::new(Arc::new(open_checkpoints_follower(settings)?), key);
            let stats = collect_stats(&log, &checkpoint).await?;
            println!("Database Statistics");
            println!("===================");
            println!("Path: {}", settings.expanded_db_path().display());
            println!("Log entries: {}", stats.log_entries);
            match stats.last_sequence {
                Some(sequence) => println!("Last sequence: {}", sequence),
                None => println!("Last sequence: (empty log)"),
            }
            match &stats.cursor {
                Some(cursor) => println!("Cursor: {}", cursor),
                None => println!("Cursor: not set"),
            }
            println!("Pending entries: {}", stats.pending);
            println!("Disk usage: {} bytes", stats.disk_usage_bytes);
        }
        AdminCommands::Compact => {
            info!("Compacting storage");
            open_log_writer(settings)?
                .compact()
                .context("Compaction failed")?;
            println!("Compaction complete");
        }
    }

    Ok(())
}

pub async fn set_cursor(checkpoint: &StorageCheckpointStore, sequence: u64) -> Result<()> {
    checkpoint
        .save(sequence)
        .await
        .context("Failed to write cursor")
}

/// Append each non-blank line of `file` as one log entry.
///
/// Every line must be valid JSON; nothing is written if any line is not.
pub fn append_file(log: &Storage, file: &Path) -> Result<Vec<u64>> {
    let contents =
        fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;

    let mut documents = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        serde_json::from_str::<serde_json::Value>(line)
            .with_context(|| format!("Line {} is not valid JSON", index + 1))?;
        documents.push(line);
    }

    if documents.is_empty() {
        return Ok(Vec::new());
    }
    log.append_batch(&documents[..])
        .context("Failed to append documents")
}

/// Commit log and cursor summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub log_entries: u64,
    pub last_sequence: Option<u64>,
    pub cursor: Option<String>,
    /// Sequence distance between the cursor and the log head
    pub pending: u64,
    pub disk_usage_bytes: u64,
}

pub async fn collect_stats(
    log: &Storage,
    checkpoint: &StorageCheckpointStore,
) -> Result<AdminStats> {
    log.catch_up().context("Failed to catch up with the commit log")?;
    let stats = log.stats().context("Failed to read storage stats")?;
    let cursor = checkpoint.load().await?;
    let position = cursor
        .as_deref()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let pending = stats.last_sequence.unwrap_or(0).saturating_sub(position);

    Ok(AdminStats {
        log_entries: stats.log_entry_count,
        last_sequence: stats.last_sequence,
        cursor,
        pending,
        disk_usage_bytes: stats.disk_usage_bytes,
    })
}
