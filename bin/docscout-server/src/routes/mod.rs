//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (trace-ID injection, origin guard, CORS)
//! - Optional OpenAPI spec endpoint (disable with `DOCSCOUT_ENABLE_DOCS=false`)
//! - Health / heartbeat route
//! - `/api` chat and search routes

mod api;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router, middleware};

use crate::middleware::{cors, origin, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api::router());

    if state.config.enable_docs {
        let api_doc = doc::get_docs();
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        );
    }

    app
        // Later layers wrap earlier ones: trace sees every request, and a
        // disallowed origin is rejected before CORS answers it.
        .layer(cors::cors_layer(&state.origins))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            origin::origin_guard,
        ))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
