use thiserror::Error;

/// Errors that can be returned by docscout-search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The caller sent no query, or only whitespace.
    #[error("search query is missing")]
    MissingQuery,

    /// The search API rejected our credentials (HTTP 401/403), or none are configured.
    #[error("search API rejected the credentials (HTTP {status}): {detail}")]
    Unauthorized { status: u16, detail: String },

    /// The search API is throttling us (HTTP 429).
    #[error("search API rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// Any other non-2xx answer from the search API.
    #[error("search API returned HTTP {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// The request could not be sent, or the body could not be decoded.
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid search configuration: {0}")]
    Config(String),
}

impl SearchError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::MissingQuery => "missing_query",
            SearchError::Unauthorized { .. } => "search_unauthorized",
            SearchError::RateLimited { .. } => "rate_limited",
            SearchError::Upstream { .. } => "search_upstream_error",
            SearchError::Http(_) => "search_unavailable",
            SearchError::Config(_) => "invalid_configuration",
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            SearchError::Unauthorized { status, .. } | SearchError::Upstream { status, .. } => {
                Some(*status)
            }
            SearchError::RateLimited { .. } => Some(429),
            SearchError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
