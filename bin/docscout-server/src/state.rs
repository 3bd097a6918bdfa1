//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use docscout_assistant::ChatWorkflow;
use docscout_search::SearchClient;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::middleware::AllowedOrigins;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub chat: ChatWorkflow,
    pub search: SearchClient,
    pub origins: AllowedOrigins,
    /// Cancelled on shutdown; every chat exchange runs on a child token.
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bind_address", &self.config.bind_address)
            .field("origins", &self.origins)
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: Config,
        chat: ChatWorkflow,
        search: SearchClient,
        shutdown: CancellationToken,
    ) -> Self {
        let origins = AllowedOrigins::new(&config.allowed_origins);
        Self {
            config: Arc::new(config),
            chat,
            search,
            origins,
            shutdown,
        }
    }
}
