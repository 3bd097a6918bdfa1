//! HTTP middleware stack.
//!
//! Applied in `routes::build`, outermost first: request tracing, the origin
//! guard, then CORS.

pub mod cors;
pub mod origin;
pub mod trace;

pub use origin::AllowedOrigins;
