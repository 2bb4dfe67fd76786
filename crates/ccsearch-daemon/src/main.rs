//! cc-search daemon
//!
//! Keeps a full-text index in sync with the commit log and serves timeline
//! search over HTTP.
//!
//! # Usage
//!
//! ```bash
//! ccsearch start [--port PORT] [--db-path PATH]
//! ccsearch sync
//! ccsearch admin cursor show|set <N>|reset
//! ccsearch admin append <FILE>
//! ccsearch admin stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/cc-search/config.toml)
//! 3. `--config` file
//! 4. Environment variables (CCSEARCH_*, then MEILISEARCH_URL/KEY/IDX and PORT)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use ccsearch_daemon::{
    handle_admin, init_logging, load_settings, run_sync_once, start_daemon, Cli, Commands,
    Overrides,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Start { port, db_path } => {
            start_daemon(
                config_path,
                Overrides {
                    port,
                    db_path,
                    log_level: cli.log_level,
                },
            )
            .await?;
        }
        Commands::Sync { db_path } => {
            run_sync_once(
                config_path,
                Overrides {
                    db_path,
                    log_level: cli.log_level,
                    ..Default::default()
                },
            )
            .await?;
        }
        Commands::Admin { db_path, command } => {
            let settings = load_settings(
                config_path,
                &Overrides {
                    db_path,
                    log_level: cli.log_level,
                    ..Default::default()
                },
            )?;
            init_logging(&settings.log_level)?;
            handle_admin(&settings, command).await?;
        }
    }

    Ok(())
}
