//! Assistant-run orchestration for docscout.
//!
//! One chat turn flows through three components:
//! 1. [`ThreadStore`] resolves the caller's thread id, creating a thread when
//!    none is given.
//! 2. [`RunOrchestrator`] appends the message, starts a run and polls it
//!    until a terminal status, the max wait, or cancellation.
//! 3. [`ResultCollector`] lists the thread's messages once the run completed.
//!
//! [`ChatWorkflow`] wires the three together behind `chat`.

pub mod admission;
pub mod api;
pub mod backoff;
pub mod collector;
pub mod config;
pub mod error;
pub mod exchange;
pub mod orchestrator;
pub mod thread;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use admission::{RunAdmission, ThreadLocks};
pub use api::{AssistantApi, ListMessagesQuery, MessagePage, OpenAiAssistants};
pub use backoff::{Backoff, BackoffKind};
pub use collector::ResultCollector;
pub use config::{AssistantConfig, CollectorConfig, PollPolicy, RunOptions};
pub use error::{AssistantError, UpstreamError, UpstreamErrorKind};
pub use exchange::{Exchange, ExchangePhase};
pub use orchestrator::{RunOrchestrator, RunResult};
pub use thread::ThreadStore;
pub use types::{Message, MessageOrder, Role, Run, RunId, RunLastError, RunStatus, ThreadId};
pub use workflow::{ChatReply, ChatWorkflow, RunSummary};

pub use tokio_util::sync::CancellationToken;
