use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::config::normalize_origin;
use crate::state::AppState;

/// Origins allowed to call the API. Empty allows every origin.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins {
    origins: Arc<[String]>,
}

impl AllowedOrigins {
    pub fn new<S: AsRef<str>>(origins: impl IntoIterator<Item = S>) -> Self {
        let origins: Vec<String> = origins
            .into_iter()
            .map(|o| normalize_origin(o.as_ref()))
            .filter(|o| !o.is_empty())
            .collect();
        Self {
            origins: origins.into(),
        }
    }

    pub fn allows_any(&self) -> bool {
        self.origins.is_empty()
    }

    /// Case-insensitive, ignoring a trailing `/`.
    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.allows_any() {
            return true;
        }
        let origin = normalize_origin(origin);
        self.origins.iter().any(|o| *o == origin)
    }
}

/// Reject requests whose `Origin` header is not allow-listed with an empty
/// 403. Requests without `Origin` (curl, server-to-server) pass.
pub async fn origin_guard(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|o| state.origins.is_allowed(o));
        if !allowed {
            warn!(
                origin = ?origin,
                path = %req.uri().path(),
                "rejected request from disallowed origin"
            );
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    next.run(req).await
}
