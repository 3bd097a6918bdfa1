//! PDF-focused web search proxy client.
//!
//! [`SearchClient`] forwards a query to the web search API, clamps the page
//! into `1..=1000` and keeps only PDF-like results (see [`filter`]).

pub mod client;
pub mod error;
pub mod filter;
pub mod types;

pub use client::{DEFAULT_ENDPOINT, SearchClient, SearchConfig};
pub use error::SearchError;
pub use filter::{is_pdf_hit, retain_pdfs, url_has_pdf_segment};
pub use types::{MAX_PAGE, RESULTS_PER_PAGE, SearchHit, SearchPage, clamp_page, offset_for};
