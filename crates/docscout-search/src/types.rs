use serde::{Deserialize, Serialize};

/// Highest page a caller may request.
pub const MAX_PAGE: u32 = 1000;

/// Results asked from upstream, and kept at most, per page.
pub const RESULTS_PER_PAGE: usize = 10;

/// One web result that passed the PDF filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// A filtered page of results for `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// The query as sent upstream (trimmed).
    pub query: String,
    /// The page actually fetched, after clamping.
    pub page: u32,
    pub results: Vec<SearchHit>,
}

impl SearchPage {
    /// Number of PDF results retained on this page.
    pub fn total_results(&self) -> usize {
        self.results.len()
    }
}

/// Clamp a caller-supplied page into `1..=MAX_PAGE`. Missing means page 1.
pub fn clamp_page(page: Option<i64>) -> u32 {
    match page {
        None => 1,
        Some(p) => p.clamp(1, i64::from(MAX_PAGE)) as u32,
    }
}

/// Zero-based upstream offset for a clamped `page`.
pub fn offset_for(page: u32) -> u32 {
    page.saturating_sub(1)
}
