use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::admission::{RunAdmission, ThreadLocks};
use crate::api::AssistantApi;
use crate::config::RunOptions;
use crate::error::AssistantError;
use crate::exchange::{Exchange, ExchangePhase};
use crate::types::{Run, RunId, ThreadId};

/// How long a best-effort upstream cancel may take before it is abandoned.
const UPSTREAM_CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

/// A run that reached `completed`, with local bookkeeping.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run: Run,
    /// Status polls issued after the run was created.
    pub polls: u32,
    /// Time spent waiting since the run was created.
    pub elapsed: Duration,
}

/// Submits a user message, starts a run and waits for it to settle.
///
/// Waiting is an async suspension: no worker thread is held between polls.
/// The wait ends on the first of
/// - a terminal run status,
/// - [`crate::PollPolicy::max_wait`] elapsing ([`AssistantError::RunTimeout`]),
/// - the caller's [`CancellationToken`] firing ([`AssistantError::Cancelled`]).
///
/// Runs on the same thread are serialized through [`ThreadLocks`]; the
/// total number of waiting runs can be capped through [`RunAdmission`].
#[derive(Clone)]
pub struct RunOrchestrator {
    api: Arc<dyn AssistantApi>,
    assistant_id: String,
    admission: RunAdmission,
    locks: ThreadLocks,
}

impl RunOrchestrator {
    pub fn new(api: Arc<dyn AssistantApi>, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            admission: RunAdmission::unlimited(),
            locks: ThreadLocks::new(),
        }
    }

    pub fn with_admission(mut self, admission: RunAdmission) -> Self {
        self.admission = admission;
        self
    }

    pub fn admission(&self) -> &RunAdmission {
        &self.admission
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Submit `text` to `thread_id` and wait for the run to finish.
    pub async fn submit_and_wait(
        &self,
        thread_id: &ThreadId,
        text: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunResult, AssistantError> {
        let mut exchange = Exchange::with_resolved_thread();
        self.drive(&mut exchange, thread_id, text, options, cancel)
            .await
    }

    /// Same as [`Self::submit_and_wait`], recording every phase change in
    /// `exchange`.
    pub async fn drive(
        &self,
        exchange: &mut Exchange,
        thread_id: &ThreadId,
        text: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunResult, AssistantError> {
        let _thread_guard = match self.locks.lock(thread_id, cancel).await {
            Ok(guard) => guard,
            Err(e) => return Err(cancelled(exchange, e)),
        };
        let _permit = match self.admission.acquire(cancel).await {
            Ok(permit) => permit,
            Err(e) => return Err(cancelled(exchange, e)),
        };

        let Some(submitted) = until_cancelled(cancel, self.api.create_message(thread_id, text)).await
        else {
            return Err(cancelled(exchange, AssistantError::Cancelled { run_id: None }));
        };
        let message_id = submitted.map_err(|e| {
            warn!(thread_id = %thread_id, error = %e, "message submission failed");
            AssistantError::submission(e)
        })?;
        exchange.advance(ExchangePhase::MessageSubmitted);
        debug!(thread_id = %thread_id, message_id = %message_id, "message submitted");

        let Some(created) =
            until_cancelled(cancel, self.api.create_run(thread_id, &self.assistant_id)).await
        else {
            warn!(thread_id = %thread_id, "run creation abandoned: cancelled");
            return Err(cancelled(exchange, AssistantError::Cancelled { run_id: None }));
        };
        let run = created.map_err(|e| {
            warn!(thread_id = %thread_id, error = %e, "run creation failed");
            AssistantError::submission(e)
        })?;
        exchange.advance(ExchangePhase::RunQueued);
        info!(
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            "run started"
        );

        self.wait_for_terminal(exchange, thread_id, run, options, cancel)
            .await
    }

    async fn wait_for_terminal(
        &self,
        exchange: &mut Exchange,
        thread_id: &ThreadId,
        mut run: Run,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunResult, AssistantError> {
        let policy = &options.poll;
        let started = Instant::now();
        let mut polls: u32 = 0;
        let mut poll_errors: u32 = 0;

        loop {
            if let Some(phase) = ExchangePhase::for_run_status(run.status) {
                exchange.advance(phase);
            }

            if run.status.is_terminal() {
                let elapsed = started.elapsed();
                if run.status.is_success() {
                    info!(
                        run_id = %run.id,
                        polls,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "run completed"
                    );
                    return Ok(RunResult {
                        run,
                        polls,
                        elapsed,
                    });
                }
                let detail = run
                    .last_error
                    .as_ref()
                    .map(|e| format!("{}: {}", e.code, e.message));
                warn!(
                    run_id = %run.id,
                    status = %run.status,
                    detail = detail.as_deref().unwrap_or(""),
                    "run ended without completing"
                );
                return Err(AssistantError::RunFailed {
                    run_id: run.id,
                    status: run.status,
                    detail,
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.max_wait {
                exchange.advance(ExchangePhase::RunTimedOut);
                warn!(
                    run_id = %run.id,
                    status = %run.status,
                    polls,
                    "run did not settle within max wait"
                );
                self.abort_upstream(thread_id, &run.id, options).await;
                return Err(AssistantError::RunTimeout {
                    run_id: run.id,
                    waited: elapsed,
                    polls,
                });
            }

            let delay = policy.backoff.delay(polls).min(policy.max_wait - elapsed);
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                polled = async {
                    tokio::time::sleep(delay).await;
                    self.api.retrieve_run(thread_id, &run.id).await
                } => Some(polled),
            };
            let Some(polled) = polled else {
                exchange.advance(ExchangePhase::Cancelled);
                info!(run_id = %run.id, polls, "stopped waiting for run: cancelled");
                self.abort_upstream(thread_id, &run.id, options).await;
                return Err(AssistantError::Cancelled {
                    run_id: Some(run.id),
                });
            };
            polls += 1;

            match polled {
                Ok(latest) => {
                    poll_errors = 0;
                    if latest.status != run.status {
                        debug!(
                            run_id = %latest.id,
                            from = %run.status,
                            to = %latest.status,
                            "run status changed"
                        );
                    }
                    run = latest;
                }
                Err(e) if e.is_transient() && poll_errors < policy.max_consecutive_poll_errors => {
                    poll_errors += 1;
                    warn!(
                        run_id = %run.id,
                        error = %e,
                        attempt = poll_errors,
                        "run status poll failed; will poll again"
                    );
                }
                Err(e) => {
                    warn!(run_id = %run.id, error = %e, "run status poll failed");
                    return Err(AssistantError::poll(e));
                }
            }
        }
    }

    /// Best-effort upstream cancel, issued only when explicitly requested.
    /// Failures are logged and never replace the caller's error.
    async fn abort_upstream(&self, thread_id: &ThreadId, run_id: &RunId, options: &RunOptions) {
        if !options.cancel_upstream_on_abort {
            return;
        }
        match tokio::time::timeout(
            UPSTREAM_CANCEL_TIMEOUT,
            self.api.cancel_run(thread_id, run_id),
        )
        .await
        {
            Ok(Ok(run)) => info!(run_id = %run_id, status = %run.status, "upstream run cancel requested"),
            Ok(Err(e)) => warn!(run_id = %run_id, error = %e, "upstream run cancel failed"),
            Err(_) => warn!(run_id = %run_id, "upstream run cancel timed out"),
        }
    }
}

/// Drive `fut` unless `cancel` fires first. An already-cancelled token
/// never starts the call.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

fn cancelled(exchange: &mut Exchange, err: AssistantError) -> AssistantError {
    if matches!(err, AssistantError::Cancelled { .. }) {
        exchange.advance(ExchangePhase::Cancelled);
    }
    err
}
