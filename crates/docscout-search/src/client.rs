use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SearchError;
use crate::filter::retain_pdfs;
use crate::types::{RESULTS_PER_PAGE, SearchHit, SearchPage, clamp_page, offset_for};

/// Brave web search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

const TOKEN_HEADER: &str = "X-Subscription-Token";

/// Explicit configuration for [`SearchClient`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Subscription token. Empty means every search answers `Unauthorized`
    /// without contacting upstream.
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Forwards queries to the web search API and keeps PDF-like results.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    web: Option<WireWeb>,
}

#[derive(Deserialize)]
struct WireWeb {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            SearchError::Config(format!("invalid search endpoint {:?}: {e}", config.endpoint))
        })?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    /// Search `query` on `page` (clamped into `1..=1000`, default 1).
    pub async fn search(&self, query: &str, page: Option<i64>) -> Result<SearchPage, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::MissingQuery);
        }
        if self.api_key.trim().is_empty() {
            return Err(SearchError::Unauthorized {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                detail: "no search API key configured".into(),
            });
        }
        let page = clamp_page(page);

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &RESULTS_PER_PAGE.to_string())
            .append_pair("offset", &offset_for(page).to_string());

        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = detail_of(&body, status);
            warn!(status = status.as_u16(), detail = %detail, "search API returned an error");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SearchError::Unauthorized {
                    status: status.as_u16(),
                    detail,
                },
                StatusCode::TOO_MANY_REQUESTS => SearchError::RateLimited { detail },
                _ => SearchError::Upstream {
                    status: status.as_u16(),
                    detail,
                },
            });
        }

        let body: WireResponse = response.json().await?;
        let raw = body.web.map(|w| w.results).unwrap_or_default();
        let fetched = raw.len();
        let results = retain_pdfs(raw);
        debug!(query, page, fetched, kept = results.len(), "search page filtered");

        Ok(SearchPage {
            query: query.to_owned(),
            page,
            results,
        })
    }
}

fn detail_of(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_owned()
    } else {
        trimmed.chars().take(512).collect()
    }
}
