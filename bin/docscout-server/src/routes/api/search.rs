//! PDF search proxy route.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::search::{SearchParams, SearchResponse, SearchResultBody};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(search), components(schemas(SearchResponse, SearchResultBody)))]
pub struct SearchApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search))
}

/// Search the web for PDF documents (`GET /api/search`).
///
/// At most 10 results per page; `totalResults` counts the PDF results kept
/// on this page.
#[utoipa::path(
    get,
    path = "/api/search",
    tag = "search",
    params(SearchParams),
    responses(
        (status = 200, description = "Filtered results", body = SearchResponse),
        (status = 400, description = "Missing query"),
        (status = 401, description = "Search API rejected the configured key"),
        (status = 403, description = "Origin not allowed"),
        (status = 429, description = "Search API rate limit exceeded"),
        (status = 500, description = "Unexpected search failure"),
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ServerError> {
    let Query(params) = params.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let query = params.query.as_deref().unwrap_or_default();
    let page = state.search.search(query, params.page_number()).await?;
    Ok(Json(page.into()))
}
