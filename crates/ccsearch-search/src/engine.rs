//! The search engine seam.
//!
//! Everything above this crate talks to the index through [`SearchEngine`],
//! bound to a single named index. Implementations: [`crate::MeiliClient`]
//! (remote Meilisearch) and [`crate::EmbeddedEngine`] (local Tantivy).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ccsearch_types::SearchableRecord;

use crate::error::SearchError;

/// A single search hit: the stored record as a JSON object.
pub type Hit = Map<String, Value>;

/// Exact-match filter on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Equals { attribute: String, value: String },
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute the filter reads.
    pub fn attribute(&self) -> &str {
        match self {
            Filter::Equals { attribute, .. } => attribute,
        }
    }
}

/// Renders Meilisearch filter syntax, e.g. `timelines = "tl1"`.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equals { attribute, value } => {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "{} = \"{}\"", attribute, escaped)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort criterion on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub attribute: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            order: SortOrder::Desc,
        }
    }

    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            order: SortOrder::Asc,
        }
    }
}

/// Renders Meilisearch sort syntax, e.g. `signedAt:desc`.
impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        write!(f, "{}:{}", self.attribute, order)
    }
}

/// A search request against the bound index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub filter: Option<Filter>,
    pub sort: Vec<SortSpec>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchQuery {
    /// Free-text query with the engine default limit of 20 and no offset.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            filter: None,
            sort: Vec::new(),
            limit: 20,
            offset: 0,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Search results plus the pagination the engine applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub estimated_total_hits: Option<u64>,
}

/// Operations cc-search needs from a search engine, scoped to one index.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Name (uid) of the bound index.
    fn index_name(&self) -> &str;

    async fn index_exists(&self) -> Result<bool, SearchError>;

    /// Create the index with `id` as primary key.
    async fn create_index(&self) -> Result<(), SearchError>;

    async fn filterable_attributes(&self) -> Result<Vec<String>, SearchError>;

    /// Replace the filterable attribute set wholesale.
    async fn set_filterable_attributes(&self, attributes: &[String]) -> Result<(), SearchError>;

    async fn sortable_attributes(&self) -> Result<Vec<String>, SearchError>;

    /// Replace the sortable attribute set wholesale.
    async fn set_sortable_attributes(&self, attributes: &[String]) -> Result<(), SearchError>;

    /// Insert or overwrite records by `id`. Returns once the write is durable
    /// and visible, or with the error that prevented it.
    async fn add_documents(&self, records: &[SearchableRecord]) -> Result<(), SearchError>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_display() {
        assert_eq!(
            Filter::equals("timelines", "tl1").to_string(),
            r#"timelines = "tl1""#
        );
        assert_eq!(
            Filter::equals("signer", r#"a"b"#).to_string(),
            r#"signer = "a\"b""#
        );
    }

    #[test]
    fn test_sort_display() {
        assert_eq!(SortSpec::desc("signedAt").to_string(), "signedAt:desc");
        assert_eq!(SortSpec::asc("signedAt").to_string(), "signedAt:asc");
    }

    #[test]
    fn test_query_builder() {
        let query = SearchQuery::new("hello")
            .with_filter(Filter::equals("timelines", "tl1"))
            .with_sort(SortSpec::desc("signedAt"))
            .with_limit(10)
            .with_offset(30);
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 30);
        assert_eq!(query.sort.len(), 1);
        assert_eq!(query.filter.unwrap().attribute(), "timelines");
    }

    #[test]
    fn test_response_deserializes_meili_shape() {
        let raw = r#"{
            "hits": [{"id": "m1", "signer": "con1"}],
            "query": "hello",
            "processingTimeMs": 1,
            "limit": 10,
            "offset": 0,
            "estimatedTotalHits": 1
        }"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.limit, 10);
        assert_eq!(response.estimated_total_hits, Some(1));
    }
}
