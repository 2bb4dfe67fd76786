//! Meilisearch REST client.
//!
//! Mutating calls in Meilisearch are asynchronous: the API answers with an
//! enqueued task and applies the change later. Every mutation here waits
//! for its task to finish so callers observe failures before moving on.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use ccsearch_types::{SearchSettings, SearchableRecord};

use crate::engine::{SearchEngine, SearchQuery, SearchResponse};
use crate::error::SearchError;

/// Connection settings for a Meilisearch index.
#[derive(Debug, Clone)]
pub struct MeiliConfig {
    /// Base URL (e.g. "http://localhost:7700")
    pub url: String,

    /// API key sent as a bearer token
    pub api_key: Option<SecretString>,

    /// Index uid
    pub index: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Upper bound on waiting for an enqueued task
    pub task_timeout: Duration,
}

impl MeiliConfig {
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            index: index.into(),
            request_timeout: Duration::from_secs(30),
            task_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Build from application settings. Returns `None` without a URL.
    pub fn from_settings(settings: &SearchSettings) -> Option<Self> {
        let url = settings.url.as_deref().filter(|u| !u.is_empty())?;
        let mut config = Self::new(url, settings.index.clone())
            .with_task_timeout(Duration::from_secs(settings.task_timeout_secs));
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            config = config.with_api_key(key);
        }
        Some(config)
    }
}

/// Task reference returned by every mutating call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TaskView {
    status: TaskStatus,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sort: Vec<String>,
    limit: usize,
    offset: usize,
}

/// [`SearchEngine`] backed by a Meilisearch server.
pub struct MeiliClient {
    client: Client,
    config: MeiliConfig,
}

impl MeiliClient {
    pub fn new(config: MeiliConfig) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn index_path(&self, suffix: &str) -> String {
        self.url(&format!("/indexes/{}{}", self.config.index, suffix))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    /// Turn a non-success response into `SearchError::Api`.
    async fn check(response: Response) -> Result<Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(SearchError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn enqueue(&self, request: RequestBuilder) -> Result<(), SearchError> {
        let response = Self::check(self.authorize(request).send().await?).await?;
        let task: EnqueuedTask = response.json().await?;
        debug!(task_uid = task.task_uid, index = %self.config.index, "Task enqueued");
        self.wait_for_task(task.task_uid).await
    }

    /// Poll a task until it finishes, backing off between polls.
    async fn wait_for_task(&self, task_uid: u64) -> Result<(), SearchError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(1),
            max_elapsed_time: Some(self.config.task_timeout),
            ..Default::default()
        };

        loop {
            let request = self.client.get(self.url(&format!("/tasks/{}", task_uid)));
            let response = Self::check(self.authorize(request).send().await?).await?;
            let task: TaskView = response.json().await?;

            match task.status {
                TaskStatus::Succeeded => return Ok(()),
                TaskStatus::Failed | TaskStatus::Canceled => {
                    let message = task
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| format!("{:?}", task.status));
                    warn!(task_uid, error = %message, "Task did not succeed");
                    return Err(SearchError::TaskFailed { task_uid, message });
                }
                TaskStatus::Enqueued | TaskStatus::Processing => match backoff.next_backoff() {
                    Some(wait) => tokio::time::sleep(wait).await,
                    None => return Err(SearchError::TaskTimeout(task_uid)),
                },
            }
        }
    }

    async fn get_attributes(&self, setting: &str) -> Result<Vec<String>, SearchError> {
        let request = self
            .client
            .get(self.index_path(&format!("/settings/{}", setting)));
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn put_attributes(&self, setting: &str, attributes: &[String]) -> Result<(), SearchError> {
        let request = self
            .client
            .put(self.index_path(&format!("/settings/{}", setting)))
            .json(attributes);
        self.enqueue(request).await
    }
}

#[async_trait]
impl SearchEngine for MeiliClient {
    fn index_name(&self) -> &str {
        &self.config.index
    }

    async fn index_exists(&self) -> Result<bool, SearchError> {
        let request = self.client.get(self.index_path(""));
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }

    async fn create_index(&self) -> Result<(), SearchError> {
        let request = self
            .client
            .post(self.url("/indexes"))
            .json(&json!({ "uid": self.config.index, "primaryKey": "id" }));
        self.enqueue(request).await
    }

    async fn filterable_attributes(&self) -> Result<Vec<String>, SearchError> {
        self.get_attributes("filterable-attributes").await
    }

    async fn set_filterable_attributes(&self, attributes: &[String]) -> Result<(), SearchError> {
        self.put_attributes("filterable-attributes", attributes).await
    }

    async fn sortable_attributes(&self) -> Result<Vec<String>, SearchError> {
        self.get_attributes("sortable-attributes").await
    }

    async fn set_sortable_attributes(&self, attributes: &[String]) -> Result<(), SearchError> {
        self.put_attributes("sortable-attributes", attributes).await
    }

    async fn add_documents(&self, records: &[SearchableRecord]) -> Result<(), SearchError> {
        let request = self
            .client
            .post(self.index_path("/documents"))
            .query(&[("primaryKey", "id")])
            .json(records);
        self.enqueue(request).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let body = SearchRequest {
            q: &query.q,
            filter: query.filter.as_ref().map(|f| f.to_string()),
            sort: query.sort.iter().map(|s| s.to_string()).collect(),
            limit: query.limit,
            offset: query.offset,
        };
        let request = self.client.post(self.index_path("/search")).json(&body);
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }
}
