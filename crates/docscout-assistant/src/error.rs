use std::time::Duration;

use thiserror::Error;

use crate::types::{RunId, RunStatus};

/// How an upstream call went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Connection, DNS, TLS or request-timeout failure; no response received.
    Network,
    /// The upstream answered with a non-2xx status.
    Status,
    /// The response body did not have the expected shape.
    Decode,
    /// The request could not be built (e.g. an identifier that is not a
    /// valid path segment). Nothing was sent.
    InvalidRequest,
}

/// A failed call to the upstream assistant API.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed{}: {detail}", fmt_status(.status))]
pub struct UpstreamError {
    /// Name of the upstream operation, e.g. `"create thread"`.
    pub operation: &'static str,
    pub kind: UpstreamErrorKind,
    /// HTTP status when the upstream answered.
    pub status: Option<u16>,
    /// Upstream error message, or the transport error text.
    pub detail: String,
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl UpstreamError {
    pub fn network(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            kind: UpstreamErrorKind::Network,
            status: None,
            detail: detail.into(),
        }
    }

    pub fn status(operation: &'static str, status: u16, detail: impl Into<String>) -> Self {
        Self {
            operation,
            kind: UpstreamErrorKind::Status,
            status: Some(status),
            detail: detail.into(),
        }
    }

    pub fn decode(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            kind: UpstreamErrorKind::Decode,
            status: None,
            detail: detail.into(),
        }
    }

    pub fn invalid_request(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            kind: UpstreamErrorKind::InvalidRequest,
            status: None,
            detail: detail.into(),
        }
    }

    /// Network failure or 5xx: the upstream could not serve the call.
    pub fn is_unavailable(&self) -> bool {
        match self.kind {
            UpstreamErrorKind::Network => true,
            UpstreamErrorKind::Status => self.status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }

    /// Worth repeating for read-only calls: unavailable, or rate-limited.
    pub fn is_transient(&self) -> bool {
        self.is_unavailable() || self.status == Some(429)
    }
}

/// Errors surfaced by the chat exchange workflow.
///
/// Every variant that originates upstream carries the [`UpstreamError`] with
/// status and detail attached. Nothing is retried implicitly except read-only
/// polling within the configured tolerance.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Creating a new thread failed. Never retried.
    #[error("thread creation failed: {0}")]
    ThreadCreation(UpstreamError),

    /// Appending the user message or starting the run was rejected.
    #[error("message submission failed: {0}")]
    MessageSubmission(UpstreamError),

    /// The run reached a terminal status other than `completed`.
    #[error("run {run_id} ended with status {status}{}", fmt_detail(.detail))]
    RunFailed {
        run_id: RunId,
        status: RunStatus,
        detail: Option<String>,
    },

    /// The run was still active when the maximum wait elapsed.
    #[error("run {run_id} still active after {waited:?} ({polls} polls)")]
    RunTimeout {
        run_id: RunId,
        waited: Duration,
        polls: u32,
    },

    /// The caller cancelled the exchange.
    #[error("exchange cancelled{}", fmt_run(.run_id))]
    Cancelled { run_id: Option<RunId> },

    /// Upstream rejected a run-status poll (4xx, or a body that did not
    /// decode). The run may still exist; it was not an outage.
    #[error("run status poll failed: {0}")]
    RunPoll(UpstreamError),

    /// Listing the thread's messages failed.
    #[error("message fetch failed: {0}")]
    MessageFetch(UpstreamError),

    /// Network failure or 5xx while submitting or polling.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(UpstreamError),

    /// The client could not be constructed from the given configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn fmt_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

fn fmt_run(run_id: &Option<RunId>) -> String {
    run_id.as_ref().map(|r| format!(" while waiting on run {r}")).unwrap_or_default()
}

impl AssistantError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AssistantError::ThreadCreation(_) => "thread_creation_failed",
            AssistantError::MessageSubmission(_) => "message_submission_failed",
            AssistantError::RunFailed { .. } => "run_failed",
            AssistantError::RunTimeout { .. } => "run_timeout",
            AssistantError::Cancelled { .. } => "cancelled",
            AssistantError::RunPoll(_) => "run_poll_failed",
            AssistantError::MessageFetch(_) => "message_fetch_failed",
            AssistantError::UpstreamUnavailable(_) => "upstream_unavailable",
            AssistantError::Config(_) => "invalid_configuration",
        }
    }

    /// Upstream HTTP status, when the error came from an upstream response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AssistantError::ThreadCreation(e)
            | AssistantError::MessageSubmission(e)
            | AssistantError::RunPoll(e)
            | AssistantError::MessageFetch(e)
            | AssistantError::UpstreamUnavailable(e) => e.status,
            _ => None,
        }
    }

    /// Classify a failed create-message / create-run call.
    pub(crate) fn submission(err: UpstreamError) -> Self {
        if err.is_unavailable() {
            AssistantError::UpstreamUnavailable(err)
        } else {
            AssistantError::MessageSubmission(err)
        }
    }

    /// Classify a run-status poll that will not be repeated.
    pub(crate) fn poll(err: UpstreamError) -> Self {
        if err.is_unavailable() {
            AssistantError::UpstreamUnavailable(err)
        } else {
            AssistantError::RunPoll(err)
        }
    }
}
