//! HTTP query service for cc-search.
//!
//! Provides:
//! - [`QueryService`]: timeline-scoped search over a [`ccsearch_search::SearchEngine`]
//! - [`router`]: the axum routes (`/cc-info`, `/timeline/:id`, `/search`)
//! - [`run_server_with_shutdown`]: bind, serve and drain on a shutdown signal

pub mod error;
pub mod query;
pub mod server;

pub use error::QueryError;
pub use query::{QueryService, SearchResult, TimelineResults, PAGE_LIMIT};
pub use server::{router, run_server_with_shutdown, serve_with_shutdown, ServerInfo, SERVICE_NAME};
