//! Timeline-scoped search over the index.
//!
//! Validates the request, builds the engine query and reshapes hits into
//! `{id, owner}` pairs. Read-only; never touches the sync cursor.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use ccsearch_search::{Filter, Hit, SearchEngine, SearchQuery, SortSpec, MAX_TOTAL_HITS};

use crate::error::QueryError;

/// Results per page, for both the versioned and legacy endpoints.
pub const PAGE_LIMIT: usize = 10;

/// One matching record as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub id: String,
    /// The record's signer
    pub owner: String,
}

/// Search outcome; `limit`/`offset` are the values the engine applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineResults {
    pub content: Vec<SearchResult>,
    pub limit: usize,
    pub offset: usize,
}

pub struct QueryService {
    engine: Arc<dyn SearchEngine>,
}

impl QueryService {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self { engine }
    }

    /// Newest-first search within one timeline.
    ///
    /// Offsets past [`MAX_TOTAL_HITS`] are clamped to it and yield an
    /// empty page on every backend.
    pub async fn search_timeline(
        &self,
        q: &str,
        timeline: &str,
        offset: usize,
    ) -> Result<TimelineResults, QueryError> {
        validate(q, timeline)?;
        let query = SearchQuery::new(q)
            .with_filter(Filter::equals("timelines", timeline))
            .with_sort(SortSpec::desc("signedAt"))
            .with_limit(PAGE_LIMIT)
            .with_offset(offset.min(MAX_TOTAL_HITS));
        self.execute(query).await
    }

    /// Relevance-ordered search within one timeline, first page only.
    pub async fn legacy_search(
        &self,
        q: &str,
        timeline: &str,
    ) -> Result<TimelineResults, QueryError> {
        validate(q, timeline)?;
        let query = SearchQuery::new(q)
            .with_filter(Filter::equals("timelines", timeline))
            .with_limit(PAGE_LIMIT);
        self.execute(query).await
    }

    async fn execute(&self, query: SearchQuery) -> Result<TimelineResults, QueryError> {
        debug!(q = %query.q, offset = query.offset, "Timeline search");
        let response = self.engine.search(&query).await.map_err(|e| {
            warn!(error = %e, "Search failed");
            QueryError::from(e)
        })?;

        Ok(TimelineResults {
            content: response.hits.iter().filter_map(to_result).collect(),
            limit: response.limit,
            offset: response.offset,
        })
    }
}

fn validate(q: &str, timeline: &str) -> Result<(), QueryError> {
    if q.is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    if timeline.is_empty() {
        return Err(QueryError::EmptyTimeline);
    }
    Ok(())
}

fn to_result(hit: &Hit) -> Option<SearchResult> {
    let id = hit.get("id").and_then(|v| v.as_str());
    let owner = hit.get("signer").and_then(|v| v.as_str());
    match (id, owner) {
        (Some(id), Some(owner)) => Some(SearchResult {
            id: id.to_string(),
            owner: owner.to_string(),
        }),
        _ => {
            warn!(?id, "Dropping hit without id or signer");
            None
        }
    }
}
