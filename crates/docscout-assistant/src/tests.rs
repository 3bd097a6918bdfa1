use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::api::{AssistantApi, ListMessagesQuery, MessagePage};
use crate::backoff::Backoff;
use crate::config::{AssistantConfig, CollectorConfig, PollPolicy, RunOptions};
use crate::error::{AssistantError, UpstreamError};
use crate::orchestrator::RunOrchestrator;
use crate::types::{Message, MessageOrder, Role, Run, RunId, RunLastError, RunStatus, ThreadId};
use crate::workflow::ChatWorkflow;

// ── Scripted upstream ─────────────────────────────────────────────────────────

/// Upstream call that hangs far past any test deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stall {
    CreateThread,
    CreateRun,
    ListMessages,
}

const STALL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct Calls {
    create_thread: AtomicU32,
    create_message: AtomicU32,
    create_run: AtomicU32,
    retrieve_run: AtomicU32,
    list_messages: AtomicU32,
    cancel_run: AtomicU32,
}

impl Calls {
    fn get(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory assistant service driven by a status script.
///
/// `retrieve_run` pops the next scripted outcome; once the script is
/// exhausted it keeps returning `sticky`. With `complete_after` set, every
/// run instead completes on its n-th poll.
struct FakeApi {
    calls: Calls,
    initial_status: RunStatus,
    script: Mutex<VecDeque<Result<RunStatus, UpstreamError>>>,
    sticky: RunStatus,
    complete_after: Option<u32>,
    last_error: Option<RunLastError>,
    thread_error: Option<UpstreamError>,
    message_error: Option<UpstreamError>,
    list_errors: Mutex<VecDeque<UpstreamError>>,
    /// Stored oldest-first.
    messages: Vec<Message>,
    stall: Option<Stall>,
    queries: Mutex<Vec<ListMessagesQuery>>,
    polls_per_run: Mutex<HashMap<RunId, u32>>,
    active_runs: AtomicU32,
    max_active_runs: AtomicU32,
    run_seq: AtomicU32,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            calls: Calls::default(),
            initial_status: RunStatus::Queued,
            script: Mutex::new(VecDeque::new()),
            sticky: RunStatus::InProgress,
            complete_after: None,
            last_error: None,
            thread_error: None,
            message_error: None,
            list_errors: Mutex::new(VecDeque::new()),
            messages: Vec::new(),
            stall: None,
            queries: Mutex::new(Vec::new()),
            polls_per_run: Mutex::new(HashMap::new()),
            active_runs: AtomicU32::new(0),
            max_active_runs: AtomicU32::new(0),
            run_seq: AtomicU32::new(0),
        }
    }
}

impl FakeApi {
    fn scripted(statuses: impl IntoIterator<Item = RunStatus>) -> Self {
        Self {
            script: Mutex::new(statuses.into_iter().map(Ok).collect()),
            messages: conversation(2),
            ..Self::default()
        }
    }

    fn run(&self, thread_id: &ThreadId, id: RunId, status: RunStatus) -> Run {
        Run {
            id,
            thread_id: thread_id.clone(),
            status,
            last_error: if status == RunStatus::Failed {
                self.last_error.clone()
            } else {
                None
            },
        }
    }

    fn finish_run(&self) {
        self.active_runs.fetch_sub(1, Ordering::SeqCst);
    }

    async fn maybe_stall(&self, at: Stall) {
        if self.stall == Some(at) {
            tokio::time::sleep(STALL).await;
        }
    }
}

#[async_trait]
impl AssistantApi for FakeApi {
    async fn create_thread(&self) -> Result<ThreadId, UpstreamError> {
        let n = self.calls.create_thread.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall(Stall::CreateThread).await;
        if let Some(err) = &self.thread_error {
            return Err(err.clone());
        }
        Ok(ThreadId::new(format!("thread_{n}")))
    }

    async fn create_message(&self, _thread_id: &ThreadId, _text: &str) -> Result<String, UpstreamError> {
        let n = self.calls.create_message.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.message_error {
            return Err(err.clone());
        }
        Ok(format!("msg_user_{n}"))
    }

    async fn create_run(&self, thread_id: &ThreadId, _assistant_id: &str) -> Result<Run, UpstreamError> {
        self.calls.create_run.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall(Stall::CreateRun).await;
        let active = self.active_runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_runs.fetch_max(active, Ordering::SeqCst);
        let id = RunId::new(format!("run_{}", self.run_seq.fetch_add(1, Ordering::SeqCst)));
        let run = self.run(thread_id, id, self.initial_status);
        if run.status.is_terminal() {
            self.finish_run();
        }
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, UpstreamError> {
        self.calls.retrieve_run.fetch_add(1, Ordering::SeqCst);
        let status = if let Some(after) = self.complete_after {
            let mut polls = self.polls_per_run.lock().unwrap();
            let n = polls.entry(run_id.clone()).or_default();
            *n += 1;
            if *n >= after {
                RunStatus::Completed
            } else {
                RunStatus::InProgress
            }
        } else {
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(status)) => status,
                Some(Err(err)) => return Err(err),
                None => self.sticky,
            }
        };
        if status.is_terminal() {
            self.finish_run();
        }
        Ok(self.run(thread_id, run_id.clone(), status))
    }

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        query: &ListMessagesQuery,
    ) -> Result<MessagePage, UpstreamError> {
        self.calls.list_messages.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        self.maybe_stall(Stall::ListMessages).await;
        if let Some(err) = self.list_errors.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut ordered: Vec<Message> = self
            .messages
            .iter()
            .cloned()
            .map(|mut m| {
                m.thread_id = thread_id.clone();
                m
            })
            .collect();
        if query.order == MessageOrder::NewestFirst {
            ordered.reverse();
        }
        let start = match &query.after {
            Some(cursor) => ordered
                .iter()
                .position(|m| &m.id == cursor)
                .map_or(ordered.len(), |i| i + 1),
            None => 0,
        };
        let end = (start + query.limit as usize).min(ordered.len());
        let data = ordered[start..end].to_vec();
        Ok(MessagePage {
            has_more: end < ordered.len(),
            last_id: data.last().map(|m| m.id.clone()),
            data,
        })
    }

    async fn cancel_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, UpstreamError> {
        self.calls.cancel_run.fetch_add(1, Ordering::SeqCst);
        Ok(self.run(thread_id, run_id.clone(), RunStatus::Cancelling))
    }
}

fn conversation(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message {
            id: format!("msg_{i}"),
            thread_id: ThreadId::new("unset"),
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: format!("turn {i}"),
            created_at: 1_700_000_000 + i as i64,
        })
        .collect()
}

fn config(interval_ms: u64, max_wait_secs: u64) -> AssistantConfig {
    AssistantConfig {
        api_key: "sk-test".into(),
        assistant_id: "asst_test".into(),
        run: RunOptions {
            poll: PollPolicy {
                backoff: Backoff::constant(Duration::from_millis(interval_ms)),
                max_wait: Duration::from_secs(max_wait_secs),
                max_consecutive_poll_errors: 2,
            },
            cancel_upstream_on_abort: false,
        },
        ..AssistantConfig::default()
    }
}

fn workflow(api: &Arc<FakeApi>, config: &AssistantConfig) -> ChatWorkflow {
    ChatWorkflow::new(Arc::clone(api) as Arc<dyn AssistantApi>, config)
}

fn unavailable() -> UpstreamError {
    UpstreamError::status("retrieve run", 502, "bad gateway")
}

// ── Happy path ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
#[traced_test]
async fn chat_creates_thread_and_returns_history() {
    let api = Arc::new(FakeApi::scripted([
        RunStatus::InProgress,
        RunStatus::InProgress,
        RunStatus::Completed,
    ]));
    let wf = workflow(&api, &config(1000, 60));

    let reply = wf
        .chat("find rust pdfs", None, &CancellationToken::new())
        .await
        .expect("chat should succeed");

    assert_eq!(reply.thread_id.as_str(), "thread_0");
    assert_eq!(reply.run.polls, 3);
    assert!(reply.run.elapsed >= Duration::from_secs(3));
    assert!(reply.run.elapsed < Duration::from_millis(3100));
    let ids: Vec<_> = reply.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["msg_0", "msg_1"]);
    assert!(reply.messages.iter().all(|m| m.thread_id == reply.thread_id));

    assert_eq!(Calls::get(&api.calls.create_thread), 1);
    assert_eq!(Calls::get(&api.calls.create_message), 1);
    assert_eq!(Calls::get(&api.calls.create_run), 1);
    assert_eq!(Calls::get(&api.calls.list_messages), 1);
    assert!(logs_contain("run completed"));
}

#[tokio::test(start_paused = true)]
async fn existing_thread_is_reused_without_creation() {
    let api = Arc::new(FakeApi::scripted([RunStatus::Completed]));
    let wf = workflow(&api, &config(1000, 60));

    let reply = wf
        .chat("again", Some(ThreadId::new("thread_existing")), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.thread_id.as_str(), "thread_existing");
    assert_eq!(Calls::get(&api.calls.create_thread), 0);
}

#[tokio::test(start_paused = true)]
async fn run_already_completed_at_creation_needs_no_poll() {
    let api = Arc::new(FakeApi {
        initial_status: RunStatus::Completed,
        messages: conversation(1),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let reply = wf.chat("hi", None, &CancellationToken::new()).await.unwrap();

    assert_eq!(reply.run.polls, 0);
    assert_eq!(Calls::get(&api.calls.retrieve_run), 0);
}

// ── Bounded wait ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn poll_count_is_bounded_by_max_wait() {
    let api = Arc::new(FakeApi::scripted([]));
    let cfg = config(1500, 10);
    let wf = workflow(&api, &cfg);

    let err = wf
        .chat("never finishes", None, &CancellationToken::new())
        .await
        .unwrap_err();

    let AssistantError::RunTimeout { waited, polls, .. } = err else {
        panic!("expected RunTimeout, got {err:?}");
    };
    // ceil(10s / 1.5s)
    assert!(polls <= 7, "polled {polls} times");
    assert!(polls < cfg.run.poll.max_polls());
    assert_eq!(polls, Calls::get(&api.calls.retrieve_run));
    assert!(waited >= Duration::from_secs(10));
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
    assert_eq!(Calls::get(&api.calls.cancel_run), 0);
}

#[tokio::test(start_paused = true)]
async fn caller_timeout_wins_over_longer_max_wait() {
    let api = Arc::new(FakeApi::scripted([]));
    let wf = workflow(&api, &config(1500, 120));

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        wf.chat("slow", None, &CancellationToken::new()),
    )
    .await;

    assert!(outcome.is_err(), "caller timeout should fire first");
    assert!(Calls::get(&api.calls.retrieve_run) <= 4);
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
}

#[tokio::test(start_paused = true)]
async fn exponential_backoff_polls_less_often() {
    let api = Arc::new(FakeApi::scripted([]));
    let mut cfg = config(1000, 30);
    cfg.run.poll.backoff = Backoff::Exponential {
        initial: Duration::from_secs(1),
        factor: 2,
        max: Duration::from_secs(8),
    };
    let wf = workflow(&api, &cfg);

    let err = wf.chat("slow", None, &CancellationToken::new()).await.unwrap_err();

    // 1 + 2 + 4 + 8 + 8 = 23s, then a 7s remainder poll.
    let AssistantError::RunTimeout { polls, .. } = err else {
        panic!("expected RunTimeout, got {err:?}");
    };
    assert_eq!(polls, 6);
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancel_mid_poll_stops_before_fetch() {
    let api = Arc::new(FakeApi::scripted([]));
    let wf = workflow(&api, &config(1000, 120));
    let cancel = CancellationToken::new();

    let handle = {
        let wf = wf.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { wf.chat("stop me", None, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let polls_at_cancel = Calls::get(&api.calls.retrieve_run);
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(
        matches!(err, AssistantError::Cancelled { run_id: Some(ref id) } if id.as_str() == "run_0"),
        "unexpected error: {err:?}"
    );
    assert_eq!(Calls::get(&api.calls.retrieve_run), polls_at_cancel);
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
    assert_eq!(Calls::get(&api.calls.cancel_run), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_can_be_forwarded_upstream() {
    let api = Arc::new(FakeApi::scripted([]));
    let mut cfg = config(1000, 120);
    cfg.run.cancel_upstream_on_abort = true;
    let wf = workflow(&api, &cfg);
    let cancel = CancellationToken::new();

    let handle = {
        let wf = wf.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { wf.chat("stop me", None, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, AssistantError::Cancelled { .. }));
    assert_eq!(Calls::get(&api.calls.cancel_run), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_forwards_cancel_when_enabled() {
    let api = Arc::new(FakeApi::scripted([]));
    let mut cfg = config(1000, 3);
    cfg.run.cancel_upstream_on_abort = true;
    let wf = workflow(&api, &cfg);

    let err = wf.chat("slow", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AssistantError::RunTimeout { .. }));
    assert_eq!(Calls::get(&api.calls.cancel_run), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_token_touches_nothing() {
    let api = Arc::new(FakeApi::scripted([RunStatus::Completed]));
    let wf = workflow(&api, &config(1000, 60));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = wf.chat("hi", None, &cancel).await.unwrap_err();

    assert!(matches!(err, AssistantError::Cancelled { run_id: None }));
    assert_eq!(Calls::get(&api.calls.create_thread), 0);
    assert_eq!(Calls::get(&api.calls.create_run), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_stalled_upstream_calls() {
    for stall in [Stall::CreateThread, Stall::CreateRun, Stall::ListMessages] {
        let api = Arc::new(FakeApi {
            stall: Some(stall),
            ..FakeApi::scripted([RunStatus::Completed])
        });
        let wf = workflow(&api, &config(1000, 120));
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let handle = {
            let wf = wf.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { wf.chat("stop me", None, &cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(
            matches!(err, AssistantError::Cancelled { run_id: None }),
            "{stall:?}: unexpected error {err:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(6), "{stall:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_during_fetch_retry_backoff() {
    let api = Arc::new(FakeApi {
        list_errors: Mutex::new(VecDeque::from([UpstreamError::status(
            "list messages",
            503,
            "busy",
        )])),
        ..FakeApi::scripted([RunStatus::Completed])
    });
    let mut cfg = config(1000, 60);
    cfg.collector.retries = 3;
    let wf = workflow(&api, &cfg);
    let cancel = CancellationToken::new();

    let handle = {
        let wf = wf.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { wf.chat("hi", None, &cancel).await })
    };
    // Run completes on the first poll at 1s; the retry waits 250ms.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, AssistantError::Cancelled { .. }), "{err:?}");
    assert_eq!(Calls::get(&api.calls.list_messages), 1);
}

// ── Run failures ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_run_reports_upstream_detail() {
    let api = Arc::new(FakeApi {
        last_error: Some(RunLastError {
            code: "server_error".into(),
            message: "boom".into(),
        }),
        ..FakeApi::scripted([RunStatus::InProgress, RunStatus::Failed])
    });
    let wf = workflow(&api, &config(1000, 60));

    let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

    match err {
        AssistantError::RunFailed { status, detail, .. } => {
            assert_eq!(status, RunStatus::Failed);
            assert_eq!(detail.as_deref(), Some("server_error: boom"));
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
}

#[tokio::test(start_paused = true)]
async fn non_completed_terminal_statuses_skip_fetch() {
    for status in [
        RunStatus::Cancelled,
        RunStatus::Expired,
        RunStatus::RequiresAction,
        RunStatus::Incomplete,
    ] {
        let api = Arc::new(FakeApi::scripted([status]));
        let wf = workflow(&api, &config(1000, 60));

        let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

        assert!(
            matches!(err, AssistantError::RunFailed { status: s, .. } if s == status),
            "{status}: unexpected error {err:?}"
        );
        assert_eq!(Calls::get(&api.calls.list_messages), 0, "{status}");
    }
}

// ── Upstream errors ───────────────────────────────────────────────────────────

#[tokio::test]
async fn thread_creation_failure_stops_the_exchange() {
    let api = Arc::new(FakeApi {
        thread_error: Some(UpstreamError::status("create thread", 401, "bad key")),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AssistantError::ThreadCreation(_)));
    assert_eq!(err.upstream_status(), Some(401));
    assert_eq!(Calls::get(&api.calls.create_thread), 1);
    assert_eq!(Calls::get(&api.calls.create_message), 0);
}

#[tokio::test]
async fn submission_errors_are_classified() {
    let rejected = Arc::new(FakeApi {
        message_error: Some(UpstreamError::status("create message", 400, "too long")),
        ..FakeApi::default()
    });
    let err = workflow(&rejected, &config(1000, 60))
        .chat("hi", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::MessageSubmission(_)));
    assert_eq!(Calls::get(&rejected.calls.create_run), 0);

    let down = Arc::new(FakeApi {
        message_error: Some(UpstreamError::network("create message", "connection refused")),
        ..FakeApi::default()
    });
    let err = workflow(&down, &config(1000, 60))
        .chat("hi", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::UpstreamUnavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_are_tolerated() {
    let api = Arc::new(FakeApi {
        script: Mutex::new(VecDeque::from([
            Err(unavailable()),
            Err(unavailable()),
            Ok(RunStatus::Completed),
        ])),
        messages: conversation(2),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let reply = wf.chat("hi", None, &CancellationToken::new()).await.unwrap();

    assert_eq!(reply.run.polls, 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_poll_errors_surface_as_unavailable() {
    let api = Arc::new(FakeApi {
        script: Mutex::new(VecDeque::from([
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok(RunStatus::Completed),
        ])),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AssistantError::UpstreamUnavailable(_)));
    assert_eq!(Calls::get(&api.calls.retrieve_run), 3);
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_poll_is_not_retried() {
    let api = Arc::new(FakeApi {
        script: Mutex::new(VecDeque::from([Err(UpstreamError::status(
            "retrieve run",
            404,
            "no such run",
        ))])),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(&err, AssistantError::RunPoll(e) if e.status == Some(404)));
    assert_eq!(err.code(), "run_poll_failed");
    assert_eq!(Calls::get(&api.calls.retrieve_run), 1);
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
}

#[tokio::test(start_paused = true)]
async fn undecodable_poll_is_not_an_outage() {
    let api = Arc::new(FakeApi {
        script: Mutex::new(VecDeque::from([Err(UpstreamError::decode(
            "retrieve run",
            "missing field `status`",
        ))])),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AssistantError::RunPoll(_)));
    assert_eq!(Calls::get(&api.calls.retrieve_run), 1);
}

// ── Message collection ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn history_is_paginated_in_order() {
    let api = Arc::new(FakeApi {
        messages: conversation(5),
        ..FakeApi::scripted([RunStatus::Completed])
    });
    let mut cfg = config(1000, 60);
    cfg.collector = CollectorConfig {
        page_size: 2,
        ..CollectorConfig::default()
    };
    let wf = workflow(&api, &cfg);

    let reply = wf.chat("hi", None, &CancellationToken::new()).await.unwrap();

    let ids: Vec<_> = reply.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["msg_0", "msg_1", "msg_2", "msg_3", "msg_4"]);
    let queries = api.queries.lock().unwrap();
    let cursors: Vec<_> = queries.iter().map(|q| q.after.as_deref()).collect();
    assert_eq!(cursors, [None, Some("msg_1"), Some("msg_3")]);
}

#[tokio::test(start_paused = true)]
async fn newest_first_order_is_passed_through() {
    let api = Arc::new(FakeApi {
        messages: conversation(3),
        ..FakeApi::scripted([RunStatus::Completed])
    });
    let mut cfg = config(1000, 60);
    cfg.collector.order = MessageOrder::NewestFirst;
    let wf = workflow(&api, &cfg);

    let reply = wf.chat("hi", None, &CancellationToken::new()).await.unwrap();

    let ids: Vec<_> = reply.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["msg_2", "msg_1", "msg_0"]);
    assert!(
        api.queries
            .lock()
            .unwrap()
            .iter()
            .all(|q| q.order == MessageOrder::NewestFirst)
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_is_not_retried_by_default() {
    let api = Arc::new(FakeApi {
        list_errors: Mutex::new(VecDeque::from([unavailable()])),
        ..FakeApi::scripted([RunStatus::Completed])
    });
    let wf = workflow(&api, &config(1000, 60));

    let err = wf.chat("hi", None, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AssistantError::MessageFetch(_)));
    assert_eq!(Calls::get(&api.calls.list_messages), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_retries_transient_failures_when_enabled() {
    let api = Arc::new(FakeApi {
        list_errors: Mutex::new(VecDeque::from([unavailable()])),
        ..FakeApi::scripted([RunStatus::Completed])
    });
    let mut cfg = config(1000, 60);
    cfg.collector.retries = 2;
    let wf = workflow(&api, &cfg);

    let reply = wf.chat("hi", None, &CancellationToken::new()).await.unwrap();

    assert_eq!(reply.messages.len(), 2);
    assert_eq!(Calls::get(&api.calls.list_messages), 2);
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn runs_on_one_thread_are_serialized() {
    let api = Arc::new(FakeApi {
        complete_after: Some(3),
        messages: conversation(1),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));
    let thread = ThreadId::new("thread_shared");

    let tasks: Vec<_> = (0..3)
        .map(|i| {
            let wf = wf.clone();
            let thread = thread.clone();
            tokio::spawn(async move {
                wf.chat(&format!("q{i}"), Some(thread), &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(api.max_active_runs.load(Ordering::SeqCst), 1);
    assert_eq!(Calls::get(&api.calls.create_run), 3);
}

#[tokio::test(start_paused = true)]
async fn distinct_threads_run_concurrently() {
    let api = Arc::new(FakeApi {
        complete_after: Some(3),
        messages: conversation(1),
        ..FakeApi::default()
    });
    let wf = workflow(&api, &config(1000, 60));

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let wf = wf.clone();
            tokio::spawn(async move { wf.chat("q", None, &CancellationToken::new()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(api.max_active_runs.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn admission_caps_concurrent_runs() {
    let api = Arc::new(FakeApi {
        complete_after: Some(2),
        messages: conversation(1),
        ..FakeApi::default()
    });
    let mut cfg = config(1000, 60);
    cfg.max_concurrent_runs = 2;
    let wf = workflow(&api, &cfg);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let wf = wf.clone();
            tokio::spawn(async move { wf.chat("q", None, &CancellationToken::new()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(api.max_active_runs.load(Ordering::SeqCst), 2);
    assert_eq!(wf.orchestrator().admission().available(), Some(2));
}

// ── Orchestrator used directly ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn submit_and_wait_returns_completed_run() {
    let api = Arc::new(FakeApi::scripted([RunStatus::InProgress, RunStatus::Completed]));
    let orchestrator = RunOrchestrator::new(Arc::clone(&api) as Arc<dyn AssistantApi>, "asst_test");
    let options = RunOptions {
        poll: PollPolicy {
            backoff: Backoff::constant(Duration::from_millis(500)),
            ..PollPolicy::default()
        },
        ..RunOptions::default()
    };

    let result = orchestrator
        .submit_and_wait(&ThreadId::new("thread_x"), "hello", &options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.run.status, RunStatus::Completed);
    assert_eq!(result.polls, 2);
    assert!(result.elapsed >= Duration::from_secs(1));
    assert!(result.elapsed < Duration::from_millis(1100));
    assert_eq!(Calls::get(&api.calls.list_messages), 0);
}
