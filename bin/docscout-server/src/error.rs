//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{"error": <code>, "message": <text>}` with an appropriate status code.
//!
//! Internal failures (configuration, unexpected transport errors) are logged
//! with full detail, but only a generic message reaches the caller.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docscout_assistant::AssistantError;
use docscout_search::SearchError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the docscout-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error(transparent)]
    Search(#[from] SearchError),

    /// The caller-level timeout around a chat exchange fired.
    #[error("chat exchange did not finish within {0:?}")]
    Timeout(Duration),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "internal server error";

impl ServerError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
            ServerError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL.to_owned())
            }
            ServerError::Assistant(e) => {
                let status = match e {
                    AssistantError::ThreadCreation(_)
                    | AssistantError::MessageSubmission(_)
                    | AssistantError::RunPoll(_)
                    | AssistantError::MessageFetch(_)
                    | AssistantError::RunFailed { .. } => StatusCode::BAD_GATEWAY,
                    AssistantError::UpstreamUnavailable(_) | AssistantError::Cancelled { .. } => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    AssistantError::RunTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    AssistantError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match e {
                    AssistantError::Config(_) => INTERNAL.to_owned(),
                    _ => e.to_string(),
                };
                (status, e.code(), message)
            }
            ServerError::Search(e) => match e {
                SearchError::MissingQuery => (StatusCode::BAD_REQUEST, e.code(), e.to_string()),
                SearchError::Unauthorized { .. } => (
                    StatusCode::UNAUTHORIZED,
                    e.code(),
                    "search API rejected the configured key".to_owned(),
                ),
                SearchError::RateLimited { .. } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    e.code(),
                    "search API rate limit exceeded".to_owned(),
                ),
                SearchError::Upstream { .. } | SearchError::Http(_) | SearchError::Config(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, e.code(), "search failed".to_owned())
                }
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            error!(status = status.as_u16(), code, error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), code, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
