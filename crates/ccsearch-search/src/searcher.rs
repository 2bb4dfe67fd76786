//! Query execution for the embedded index.
//!
//! Filtering and sorting are only allowed on attributes declared in the
//! index settings, matching Meilisearch behavior.

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocAddress, Order, Searcher, TantivyDocument, Term};
use tracing::{debug, warn};

use crate::document::doc_to_hit;
use crate::engine::{Filter, Hit, SearchQuery, SearchResponse, SortOrder, SortSpec};
use crate::error::SearchError;
use crate::index::{IndexSettings, SearchIndex};
use crate::schema::{RecordSchema, FIELD_SIGNED_AT};

/// Deepest rank a page may reach, as Meilisearch's default `maxTotalHits`.
pub const MAX_TOTAL_HITS: usize = 1000;

/// Run `query` against the index.
///
/// Only the first sort criterion is applied. Pages past
/// [`MAX_TOTAL_HITS`] come back empty.
pub fn search_records(index: &SearchIndex, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
    let settings = index.settings()?;
    let schema = index.schema();

    let sort = query.sort.first();
    if let Some(sort) = sort {
        check_sortable(&settings, sort)?;
    }

    let text_query = parse_text(index, schema, &query.q);
    let final_query: Box<dyn Query> = match &query.filter {
        Some(filter) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, text_query),
            (Occur::Must, filter_query(&settings, schema, filter)?),
        ])),
        None => text_query,
    };

    let searcher = index.reader().searcher();

    // offset + window never exceeds MAX_TOTAL_HITS
    let window = query
        .limit
        .min(MAX_TOTAL_HITS.saturating_sub(query.offset));

    let (addresses, total) = if window == 0 {
        (Vec::new(), searcher.search(&final_query, &Count)?)
    } else {
        let top = TopDocs::with_limit(window).and_offset(query.offset);
        match sort {
            Some(sort) => {
                let order = match sort.order {
                    SortOrder::Asc => Order::Asc,
                    SortOrder::Desc => Order::Desc,
                };
                let sorted = top.order_by_fast_field::<i64>(FIELD_SIGNED_AT, order);
                let (docs, total) = searcher.search(&final_query, &(sorted, Count))?;
                (docs.into_iter().map(|(_, addr)| addr).collect(), total)
            }
            None => {
                let (docs, total) = searcher.search(&final_query, &(top, Count))?;
                (docs.into_iter().map(|(_, addr)| addr).collect(), total)
            }
        }
    };

    let hits = load_hits(&searcher, schema, addresses)?;
    debug!(q = %query.q, hits = hits.len(), total, "Embedded search complete");

    Ok(SearchResponse {
        hits,
        limit: query.limit,
        offset: query.offset,
        estimated_total_hits: Some(total as u64),
    })
}

/// Free text against the body text; an empty query matches everything.
fn parse_text(index: &SearchIndex, schema: &RecordSchema, q: &str) -> Box<dyn Query> {
    if q.trim().is_empty() {
        return Box::new(AllQuery);
    }
    let mut parser = QueryParser::for_index(index.index(), vec![schema.text]);
    parser.set_conjunction_by_default();
    let (parsed, errors) = parser.parse_query_lenient(q);
    if !errors.is_empty() {
        warn!(q, errors = errors.len(), "Query parsed leniently");
    }
    parsed
}

fn filter_query(
    settings: &IndexSettings,
    schema: &RecordSchema,
    filter: &Filter,
) -> Result<Box<dyn Query>, SearchError> {
    let attribute = filter.attribute();
    if !settings.filterable_attributes.iter().any(|a| a == attribute) {
        return Err(SearchError::InvalidFilter(attribute.to_string()));
    }

    let Filter::Equals { value, .. } = filter;
    let term = if attribute == FIELD_SIGNED_AT {
        let millis: i64 = value
            .parse()
            .map_err(|_| SearchError::InvalidFilter(format!("{} = {}", attribute, value)))?;
        Term::from_field_i64(schema.signed_at, millis)
    } else {
        let field = schema
            .keyword_field(attribute)
            .ok_or_else(|| SearchError::InvalidFilter(attribute.to_string()))?;
        Term::from_field_text(field, value)
    };

    Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
}

fn check_sortable(settings: &IndexSettings, sort: &SortSpec) -> Result<(), SearchError> {
    let declared = settings
        .sortable_attributes
        .iter()
        .any(|a| *a == sort.attribute);
    // signedAt is the only fast field
    if !declared || sort.attribute != FIELD_SIGNED_AT {
        return Err(SearchError::InvalidSort(sort.attribute.clone()));
    }
    Ok(())
}

fn load_hits(
    searcher: &Searcher,
    schema: &RecordSchema,
    addresses: Vec<DocAddress>,
) -> Result<Vec<Hit>, SearchError> {
    addresses
        .into_iter()
        .map(|addr| {
            let doc: TantivyDocument = searcher.doc(addr)?;
            Ok(doc_to_hit(schema, &doc))
        })
        .collect()
}
