//! Background job scheduler for the cc-search daemon.
//!
//! Jobs run on a fixed period. Each tick spawns the job as its own task, so
//! a slow run never delays the next tick; jobs that must not overlap guard
//! themselves. Missed ticks are skipped rather than replayed.
//!
//! # Example
//!
//! ```ignore
//! use ccsearch_scheduler::{SchedulerConfig, SchedulerService};
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::default());
//! scheduler.add_interval_job("sync", Duration::from_secs(10), move |_token| {
//!     let engine = engine.clone();
//!     async move { engine.run_cycle().await; }
//! })?;
//!
//! scheduler.start()?;
//! // ...
//! scheduler.shutdown().await?;
//! ```

mod config;
mod error;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use scheduler::SchedulerService;
