use axum::http::HeaderValue;
use axum::http::request::Parts;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::middleware::AllowedOrigins;

/// CORS answers for the same allow-list the origin guard enforces.
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.allows_any() {
        // Development default; set DOCSCOUT_ALLOWED_ORIGINS in production.
        return layer.allow_origin(Any);
    }
    let origins = origins.clone();
    layer.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts: &Parts| {
            origin.to_str().is_ok_and(|o| origins.is_allowed(o))
        },
    ))
}
