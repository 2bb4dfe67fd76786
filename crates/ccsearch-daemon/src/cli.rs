//! CLI argument parsing for the cc-search daemon.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cc-search
///
/// Keeps a full-text index in sync with the commit log and serves timeline
/// search over it.
#[derive(Parser, Debug)]
#[command(name = "ccsearch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (in addition to ~/.config/cc-search/config)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the index, schedule sync cycles and serve HTTP
    Start {
        /// Override HTTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override database path
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Reconcile the index and run a single sync cycle
    Sync {
        /// Override database path
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Administrative commands
    Admin {
        /// Database path (default from config)
        #[arg(long)]
        db_path: Option<String>,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Inspect or move the sync cursor
    Cursor {
        #[command(subcommand)]
        command: CursorCommands,
    },

    /// Append one JSON document per line of FILE to the commit log
    Append {
        file: PathBuf,
    },

    /// Show database statistics
    Stats,

    /// Trigger RocksDB compaction
    Compact,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CursorCommands {
    /// Print the stored cursor
    Show,

    /// Overwrite the cursor; the next cycle starts after this sequence
    Set {
        sequence: u64,
    },

    /// Delete the cursor; the next cycle starts from the beginning
    Reset,
}
