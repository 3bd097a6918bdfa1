//! Lifecycle of one chat exchange.
//!
//! ```text
//! NEW → THREAD_RESOLVED → MESSAGE_SUBMITTED → RUN_QUEUED → RUN_IN_PROGRESS
//!     → { RUN_COMPLETED | RUN_FAILED | RUN_TIMED_OUT | CANCELLED }
//!     → (RUN_COMPLETED only) MESSAGES_FETCHED
//! ```
//!
//! Upstream failures before a run exists (thread creation, submission) end
//! the exchange without a phase change; the error itself is the outcome.

use tracing::{debug, warn};

use crate::types::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangePhase {
    New,
    ThreadResolved,
    MessageSubmitted,
    RunQueued,
    RunInProgress,
    RunCompleted,
    RunFailed,
    RunTimedOut,
    Cancelled,
    MessagesFetched,
}

impl ExchangePhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangePhase::RunFailed
                | ExchangePhase::RunTimedOut
                | ExchangePhase::Cancelled
                | ExchangePhase::MessagesFetched
        )
    }

    pub fn can_advance_to(self, next: ExchangePhase) -> bool {
        use ExchangePhase::*;
        match (self, next) {
            (New, ThreadResolved) => true,
            (ThreadResolved, MessageSubmitted) => true,
            (MessageSubmitted, RunQueued) => true,
            (RunQueued, RunInProgress) => true,
            (RunQueued | RunInProgress, RunCompleted | RunFailed | RunTimedOut) => true,
            (RunCompleted, MessagesFetched) => true,
            (from, Cancelled) => !from.is_terminal() && from != RunCompleted,
            _ => false,
        }
    }

    /// Phase implied by an observed run status, if it moves the exchange.
    pub fn for_run_status(status: RunStatus) -> Option<ExchangePhase> {
        match status {
            RunStatus::InProgress | RunStatus::Cancelling => Some(ExchangePhase::RunInProgress),
            RunStatus::Completed => Some(ExchangePhase::RunCompleted),
            s if s.is_terminal() => Some(ExchangePhase::RunFailed),
            _ => None,
        }
    }
}

/// Tracks the phase of one exchange and the path it took.
#[derive(Debug, Clone)]
pub struct Exchange {
    history: Vec<ExchangePhase>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    pub fn new() -> Self {
        Self {
            history: vec![ExchangePhase::New],
        }
    }

    /// Start an exchange whose thread is already known.
    pub fn with_resolved_thread() -> Self {
        Self {
            history: vec![ExchangePhase::New, ExchangePhase::ThreadResolved],
        }
    }

    pub fn phase(&self) -> ExchangePhase {
        self.history
            .last()
            .copied()
            .unwrap_or(ExchangePhase::New)
    }

    pub fn history(&self) -> &[ExchangePhase] {
        &self.history
    }

    /// Move to `next`. Re-entering the current phase is a no-op; an illegal
    /// transition is logged and ignored. Returns whether the phase changed.
    pub fn advance(&mut self, next: ExchangePhase) -> bool {
        let current = self.phase();
        if current == next {
            return false;
        }
        if !current.can_advance_to(next) {
            warn!(from = %current, to = %next, "ignoring illegal exchange transition");
            return false;
        }
        debug!(from = %current, to = %next, "exchange phase");
        self.history.push(next);
        true
    }
}
