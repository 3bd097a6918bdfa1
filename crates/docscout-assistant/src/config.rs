//! Explicit configuration handed to each component at construction.
//!
//! Nothing in this crate reads the process environment; the embedding
//! application builds these structs (see `docscout-server`'s `Config`).

use std::time::Duration;

use crate::backoff::Backoff;
use crate::error::AssistantError;
use crate::types::MessageOrder;

/// Default base URL of the OpenAI REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// How run status is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay schedule between two polls.
    pub backoff: Backoff,
    /// Give up with [`AssistantError::RunTimeout`] once this much time has
    /// elapsed since the run was created.
    pub max_wait: Duration,
    /// Consecutive transient poll failures tolerated before surfacing
    /// [`AssistantError::UpstreamUnavailable`]. Polling is read-only, so
    /// repeating it is safe. A rejected poll surfaces
    /// [`AssistantError::RunPoll`] at once.
    pub max_consecutive_poll_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            max_wait: Duration::from_secs(120),
            max_consecutive_poll_errors: 2,
        }
    }
}

impl PollPolicy {
    /// Upper bound on status polls: `ceil(max_wait / min_delay) + 1`.
    pub fn max_polls(&self) -> u32 {
        let min = self.backoff.min_delay().as_nanos();
        let wait = self.max_wait.as_nanos();
        let ceil = wait.div_ceil(min);
        u32::try_from(ceil).unwrap_or(u32::MAX).saturating_add(1)
    }
}

/// Per-exchange run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub poll: PollPolicy,
    /// On timeout or cancellation, ask upstream to cancel the run. Off by
    /// default: the upstream run is left as-is.
    pub cancel_upstream_on_abort: bool,
}

/// Message listing behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    pub order: MessageOrder,
    /// Page size requested from upstream (1..=100).
    pub page_size: u32,
    /// Extra attempts for a transiently failing page request. Default `0`.
    pub retries: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            order: MessageOrder::OldestFirst,
            page_size: 100,
            retries: 0,
        }
    }
}

/// Everything needed to build a [`crate::ChatWorkflow`] against OpenAI.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub base_url: String,
    /// Assistant every run is started against.
    pub assistant_id: String,
    /// Per-request HTTP timeout for upstream calls.
    pub http_timeout: Duration,
    pub run: RunOptions,
    pub collector: CollectorConfig,
    /// Cap on runs being waited on concurrently; `0` disables the cap.
    pub max_concurrent_runs: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            assistant_id: String::new(),
            http_timeout: Duration::from_secs(30),
            run: RunOptions::default(),
            collector: CollectorConfig::default(),
            max_concurrent_runs: 0,
        }
    }
}

impl AssistantConfig {
    pub fn validate(&self) -> Result<(), AssistantError> {
        if self.api_key.trim().is_empty() {
            return Err(AssistantError::Config("API key is empty".into()));
        }
        if self.assistant_id.trim().is_empty() {
            return Err(AssistantError::Config("assistant id is empty".into()));
        }
        if !(1..=100).contains(&self.collector.page_size) {
            return Err(AssistantError::Config(format!(
                "message page size {} is outside 1..=100",
                self.collector.page_size
            )));
        }
        if self.run.poll.max_wait.is_zero() {
            return Err(AssistantError::Config("run max wait must be positive".into()));
        }
        Ok(())
    }
}
