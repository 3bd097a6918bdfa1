//! Server configuration, loaded from environment variables at startup.
//!
//! This is the only place the process environment is read. The library
//! crates receive explicit [`AssistantConfig`] / [`SearchConfig`] structs.

use std::time::Duration;

use docscout_assistant::{
    AssistantConfig, Backoff, BackoffKind, CollectorConfig, MessageOrder, PollPolicy, RunOptions,
};
use docscout_search::SearchConfig;

/// Runtime configuration for docscout-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; chat requests then fail until `OPENAI_API_KEY` and
/// `DOCSCOUT_ASSISTANT_ID` are provided.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    pub openai_api_key: String,
    pub openai_base_url: String,
    pub assistant_id: String,

    pub poll_backoff: BackoffKind,
    pub poll_interval_ms: u64,
    /// Cap for linear / exponential backoff.
    pub poll_max_delay_ms: u64,
    pub run_max_wait_secs: u64,

    /// Caller-level timeout wrapped around each chat exchange.
    pub chat_timeout_secs: u64,

    /// `0` disables the cap.
    pub max_concurrent_runs: usize,
    pub message_order: MessageOrder,
    pub cancel_run_on_abort: bool,

    pub search_api_key: String,
    pub search_endpoint: String,

    /// Normalised allow-list; empty allows every origin.
    pub allowed_origins: Vec<String>,

    /// Serve `/api-docs/openapi.json` (default: `true`).
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());
        let flag = |key: &str, default: bool| {
            get(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        Self {
            bind_address: env_or("DOCSCOUT_BIND", "0.0.0.0:3000"),
            log_level: env_or("DOCSCOUT_LOG", "info"),
            log_json: flag("DOCSCOUT_LOG_JSON", false),
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            openai_base_url: env_or(
                "DOCSCOUT_OPENAI_BASE_URL",
                docscout_assistant::config::DEFAULT_BASE_URL,
            ),
            assistant_id: env_or("DOCSCOUT_ASSISTANT_ID", ""),
            poll_backoff: parse_env(&get, "DOCSCOUT_POLL_BACKOFF", BackoffKind::Constant),
            poll_interval_ms: parse_env(&get, "DOCSCOUT_POLL_INTERVAL_MS", 1500),
            poll_max_delay_ms: parse_env(&get, "DOCSCOUT_POLL_MAX_DELAY_MS", 10_000),
            run_max_wait_secs: parse_env(&get, "DOCSCOUT_RUN_MAX_WAIT_SECS", 120),
            chat_timeout_secs: parse_env(&get, "DOCSCOUT_CHAT_TIMEOUT_SECS", 150),
            max_concurrent_runs: parse_env(&get, "DOCSCOUT_MAX_CONCURRENT_RUNS", 0),
            message_order: parse_env(&get, "DOCSCOUT_MESSAGE_ORDER", MessageOrder::OldestFirst),
            cancel_run_on_abort: flag("DOCSCOUT_CANCEL_RUN_ON_ABORT", false),
            search_api_key: env_or("DOCSCOUT_SEARCH_API_KEY", ""),
            search_endpoint: env_or("DOCSCOUT_SEARCH_ENDPOINT", docscout_search::DEFAULT_ENDPOINT),
            allowed_origins: split_origins(&env_or("DOCSCOUT_ALLOWED_ORIGINS", "")),
            enable_docs: flag("DOCSCOUT_ENABLE_DOCS", true),
        }
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn assistant_config(&self) -> AssistantConfig {
        let backoff = Backoff::from_kind(
            self.poll_backoff,
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.poll_max_delay_ms),
        );
        AssistantConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            assistant_id: self.assistant_id.clone(),
            run: RunOptions {
                poll: PollPolicy {
                    backoff,
                    max_wait: Duration::from_secs(self.run_max_wait_secs),
                    ..PollPolicy::default()
                },
                cancel_upstream_on_abort: self.cancel_run_on_abort,
            },
            collector: CollectorConfig {
                order: self.message_order,
                ..CollectorConfig::default()
            },
            max_concurrent_runs: self.max_concurrent_runs,
            ..AssistantConfig::default()
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            api_key: self.search_api_key.clone(),
            endpoint: self.search_endpoint.clone(),
            ..SearchConfig::default()
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_env<T: std::str::FromStr>(get: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_origin)
        .filter(|o| !o.is_empty())
        .collect()
}

/// Lower-case and drop a trailing `/`, so `https://Docs.Example.com/`
/// matches the `Origin` header a browser sends.
pub fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
