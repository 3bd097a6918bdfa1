//! docscout-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the assistant workflow and the search client.
//! 4. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use docscout_assistant::ChatWorkflow;
use docscout_search::SearchClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: DOCSCOUT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "docscout-server starting");

    // ── 3. Upstream clients ────────────────────────────────────────────────────
    let assistant_config = cfg.assistant_config();
    let chat = ChatWorkflow::from_config(&assistant_config)
        .context("assistant configuration is incomplete (OPENAI_API_KEY, DOCSCOUT_ASSISTANT_ID)")?;
    info!(
        assistant_id = %assistant_config.assistant_id,
        base_url = %assistant_config.base_url,
        backoff = %cfg.poll_backoff,
        max_wait_secs = cfg.run_max_wait_secs,
        "assistant workflow ready"
    );

    let search = SearchClient::new(&cfg.search_config())?;
    if cfg.search_api_key.is_empty() {
        warn!("DOCSCOUT_SEARCH_API_KEY is not set; /api/search will answer 401");
    }
    if cfg.allowed_origins.is_empty() {
        warn!("DOCSCOUT_ALLOWED_ORIGINS is empty; every origin is allowed");
    }

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(cfg.clone(), chat, search, shutdown.clone()));

    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // In-flight chat exchanges stop polling and answer 503.
            shutdown.cancel();
        })
        .await?;

    info!("docscout-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
