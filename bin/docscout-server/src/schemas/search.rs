use docscout_search::{SearchHit, SearchPage};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query string of `GET /api/search`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Search terms. Required.
    pub query: Option<String>,
    /// 1-based page, clamped into `1..=1000`. Defaults to 1.
    pub page: Option<String>,
}

impl SearchParams {
    /// Lenient page parsing: garbage means "first page", an all-digit value
    /// too large for `i64` means "last page".
    pub fn page_number(&self) -> Option<i64> {
        let raw = self.page.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i64>() {
            Ok(page) => Some(page),
            Err(_) if raw.bytes().all(|b| b.is_ascii_digit()) => Some(i64::MAX),
            Err(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResultBody {
    pub title: String,
    pub url: String,
    pub description: String,
}

impl From<SearchHit> for SearchResultBody {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.title,
            url: hit.url,
            description: hit.description,
        }
    }
}

/// Response body for `GET /api/search`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultBody>,
    /// PDF results retained on this page.
    pub total_results: usize,
    pub query: String,
    pub page: u32,
}

impl From<SearchPage> for SearchResponse {
    fn from(page: SearchPage) -> Self {
        Self {
            total_results: page.total_results(),
            results: page.results.into_iter().map(Into::into).collect(),
            query: page.query,
            page: page.page,
        }
    }
}
