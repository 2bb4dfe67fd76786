//! HTTP surface: routes, middleware and the serve loop.
//!
//! - `GET /cc-info` static service descriptor
//! - `GET /timeline/:id?q=&offset=` newest-first timeline search
//! - `GET /search?q=&timeline=` legacy relevance-ordered search

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::QueryError;
use crate::query::{QueryService, SearchResult, TimelineResults};

/// Value of `name` in `/cc-info`.
pub const SERVICE_NAME: &str = "github.com/concrnt/cc-search";

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl ServerInfo {
    pub fn current() -> Self {
        Self {
            name: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchBody {
    status: &'static str,
    content: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<usize>,
}

impl SearchBody {
    fn paged(results: TimelineResults) -> Self {
        Self {
            status: "ok",
            content: results.content,
            limit: Some(results.limit),
            offset: Some(results.offset),
        }
    }

    fn unpaged(results: TimelineResults) -> Self {
        Self {
            status: "ok",
            content: results.content,
            limit: None,
            offset: None,
        }
    }
}

// Parameters are taken as raw strings so that malformed values degrade
// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
struct TimelineParams {
    q: Option<String>,
    offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyParams {
    q: Option<String>,
    timeline: Option<String>,
}

/// Absent, non-numeric or negative offsets read as 0.
fn parse_offset(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok()).unwrap_or(0)
}

async fn cc_info() -> Json<ServerInfo> {
    Json(ServerInfo::current())
}

async fn timeline(
    State(service): State<Arc<QueryService>>,
    Path(id): Path<String>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<SearchBody>, QueryError> {
    search_timeline(&service, &id, params).await
}

/// `/timeline/` with an empty id segment.
async fn timeline_without_id(
    State(service): State<Arc<QueryService>>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<SearchBody>, QueryError> {
    search_timeline(&service, "", params).await
}

async fn search_timeline(
    service: &QueryService,
    timeline: &str,
    params: TimelineParams,
) -> Result<Json<SearchBody>, QueryError> {
    let q = params.q.unwrap_or_default();
    let offset = parse_offset(params.offset.as_deref());
    let results = service.search_timeline(&q, timeline, offset).await?;
    Ok(Json(SearchBody::paged(results)))
}

async fn legacy_search(
    State(service): State<Arc<QueryService>>,
    Query(params): Query<LegacyParams>,
) -> Result<Json<SearchBody>, QueryError> {
    let q = params.q.unwrap_or_default();
    let timeline = params.timeline.unwrap_or_default();
    let results = service.legacy_search(&q, &timeline).await?;
    Ok(Json(SearchBody::unpaged(results)))
}

/// Build the router with request tracing, permissive CORS and panic
/// recovery.
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/cc-info", get(cc_info))
        .route("/timeline/", get(timeline_without_id))
        .route("/timeline/:id", get(timeline))
        .route("/search", get(legacy_search))
        .with_state(service)
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until `shutdown_signal` resolves.
pub async fn run_server_with_shutdown<F>(
    addr: SocketAddr,
    service: Arc<QueryService>,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(listener, service, shutdown_signal).await
}

/// Serve on an already bound listener until `shutdown_signal` resolves,
/// then drain in-flight requests.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    service: Arc<QueryService>,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "HTTP server ready");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use ccsearch_search::{EmbeddedEngine, SearchEngine, SearchIndexConfig};
    use ccsearch_types::{RecordType, SearchableRecord};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::time::timeout;
    use tower::ServiceExt;

    fn record(id: &str, text: &str, signed_at: i64, timeline: &str) -> SearchableRecord {
        SearchableRecord {
            id: id.into(),
            record_type: RecordType::Message,
            body: json!({ "body": text }),
            schema: "https://schema.concrnt.world/m/markdown.json".into(),
            signed_at,
            signer: "con1abc".into(),
            timelines: vec![timeline.into()],
        }
    }

    async fn seeded_engine(temp_dir: &TempDir) -> Arc<EmbeddedEngine> {
        let engine = EmbeddedEngine::open("ccsearch", SearchIndexConfig::new(temp_dir.path()))
            .unwrap();
        engine.create_index().await.unwrap();
        engine
            .set_filterable_attributes(&["signer".to_string(), "timelines".to_string()])
            .await
            .unwrap();
        engine
            .set_sortable_attributes(&["signedAt".to_string()])
            .await
            .unwrap();
        engine
            .add_documents(&[
                record("m1", "hello world", 1_000, "tl1"),
                record("m2", "hello again", 2_000, "tl1"),
                record("m3", "hello elsewhere", 3_000, "tl2"),
            ])
            .await
            .unwrap();
        Arc::new(engine)
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_cc_info() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(Arc::new(QueryService::new(seeded_engine(&temp_dir).await)));

        let (status, body) = fetch(app, "/cc-info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], SERVICE_NAME);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_timeline_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(Arc::new(QueryService::new(seeded_engine(&temp_dir).await)));

        let (status, body) = fetch(app, "/timeline/tl1?q=hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "ok",
                "content": [
                    {"id": "m2", "owner": "con1abc"},
                    {"id": "m1", "owner": "con1abc"}
                ],
                "limit": 10,
                "offset": 0
            })
        );
    }

    #[tokio::test]
    async fn test_timeline_offset() {
        let temp_dir = TempDir::new().unwrap();
        let service = Arc::new(QueryService::new(seeded_engine(&temp_dir).await));

        let (_, body) = fetch(router(service.clone()), "/timeline/tl1?q=hello&offset=1").await;
        assert_eq!(body["content"], json!([{"id": "m1", "owner": "con1abc"}]));
        assert_eq!(body["offset"], 1);

        let (status, body) = fetch(router(service), "/timeline/tl1?q=hello&offset=-4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["offset"], 0);
    }

    #[tokio::test]
    async fn test_timeline_huge_offset_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let service = Arc::new(QueryService::new(seeded_engine(&temp_dir).await));

        for offset in ["4000000000", "18446744073709551615"] {
            let uri = format!("/timeline/tl1?q=hello&offset={}", offset);
            let (status, body) = fetch(router(service.clone()), &uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "ok");
            assert_eq!(body["content"], json!([]));
            assert_eq!(body["offset"], 1000);
        }
    }

    #[tokio::test]
    async fn test_timeline_without_matches() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(Arc::new(QueryService::new(seeded_engine(&temp_dir).await)));

        let (status, body) = fetch(app, "/timeline/tl9?q=hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["content"], json!([]));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let temp_dir = TempDir::new().unwrap();
        let service = Arc::new(QueryService::new(seeded_engine(&temp_dir).await));

        let (status, body) = fetch(router(service.clone()), "/timeline/tl1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "query is empty"}));

        let (status, body) = fetch(router(service.clone()), "/timeline/?q=hello").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "timeline is empty"}));

        let (status, body) = fetch(router(service), "/search?q=hello").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "timeline is empty"}));
    }

    #[tokio::test]
    async fn test_legacy_search() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(Arc::new(QueryService::new(seeded_engine(&temp_dir).await)));

        let (status, body) = fetch(app, "/search?q=elsewhere&timeline=tl2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ok", "content": [{"id": "m3", "owner": "con1abc"}]})
        );
    }

    #[tokio::test]
    async fn test_engine_failure_is_500() {
        let temp_dir = TempDir::new().unwrap();
        // Index never created
        let engine =
            EmbeddedEngine::open("ccsearch", SearchIndexConfig::new(temp_dir.path())).unwrap();
        let app = router(Arc::new(QueryService::new(Arc::new(engine))));

        let (status, body) = fetch(app, "/timeline/tl1?q=hello").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("ccsearch"));
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset(None), 0);
        assert_eq!(parse_offset(Some("30")), 30);
        assert_eq!(parse_offset(Some("abc")), 0);
        assert_eq!(parse_offset(Some("-1")), 0);
    }

    #[tokio::test]
    async fn test_server_starts_and_shuts_down() {
        let temp_dir = TempDir::new().unwrap();
        let service = Arc::new(QueryService::new(seeded_engine(&temp_dir).await));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            serve_with_shutdown(listener, service, async {
                rx.await.ok();
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).ok();

        let result = timeout(Duration::from_secs(5), server_handle).await;
        assert!(result.is_ok());
    }
}
