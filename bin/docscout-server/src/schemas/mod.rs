//! Request / response bodies of the `/api` routes.
//!
//! Field names are camelCase on the wire.

pub mod chat;
pub mod search;
