//! cc-search daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `app`: Startup wiring of stores, engine, sync and query components
//! - `commands`: Command implementations (start, sync, admin)

pub mod app;
pub mod cli;
pub mod commands;

pub use app::{
    build_engine, open_checkpoints, open_checkpoints_follower, open_log_follower, open_log_writer,
    App, Stores,
};
pub use cli::{AdminCommands, Cli, Commands, CursorCommands};
pub use commands::{
    append_file, collect_stats, handle_admin, init_logging, load_settings, run_sync_once,
    set_cursor, start_daemon, AdminStats, Overrides,
};
