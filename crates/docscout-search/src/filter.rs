//! PDF heuristics applied to raw web results.

use reqwest::Url;

use crate::types::{RESULTS_PER_PAGE, SearchHit};

/// `true` when some path segment of `url` ends in `.pdf`, ignoring case.
///
/// Query strings and fragments are not inspected, so
/// `https://x.com/view?file=a.pdf` does not match on its URL alone.
pub fn url_has_pdf_segment(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .is_some_and(|mut segments| segments.any(is_pdf_name)),
        // Relative or malformed: fall back to a plain split.
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .any(is_pdf_name),
    }
}

fn is_pdf_name(segment: &str) -> bool {
    segment.len() > 4 && segment.to_ascii_lowercase().ends_with(".pdf")
}

fn mentions_pdf(text: &str) -> bool {
    text.to_ascii_lowercase().contains("pdf")
}

/// A hit is PDF-like when its URL has a `.pdf` segment or its title or
/// description mentions "pdf".
pub fn is_pdf_hit(hit: &SearchHit) -> bool {
    url_has_pdf_segment(&hit.url) || mentions_pdf(&hit.title) || mentions_pdf(&hit.description)
}

/// Keep PDF-like hits in upstream order, at most [`RESULTS_PER_PAGE`].
pub fn retain_pdfs(hits: impl IntoIterator<Item = SearchHit>) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(is_pdf_hit)
        .take(RESULTS_PER_PAGE)
        .collect()
}
