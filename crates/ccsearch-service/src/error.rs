//! Query errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use ccsearch_search::SearchError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("timeline is empty")]
    EmptyTimeline,

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::EmptyQuery | QueryError::EmptyTimeline => StatusCode::BAD_REQUEST,
            QueryError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"error": "<message>"}` with the matching status.
impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(QueryError::EmptyQuery.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(QueryError::EmptyTimeline.status_code(), StatusCode::BAD_REQUEST);

        let err = QueryError::from(SearchError::Api {
            status: 503,
            message: "unavailable".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(QueryError::EmptyQuery.to_string(), "query is empty");
        assert_eq!(QueryError::EmptyTimeline.to_string(), "timeline is empty");
    }
}
