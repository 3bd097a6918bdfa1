use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admission::RunAdmission;
use crate::api::{AssistantApi, OpenAiAssistants};
use crate::collector::ResultCollector;
use crate::config::{AssistantConfig, RunOptions};
use crate::error::AssistantError;
use crate::exchange::{Exchange, ExchangePhase};
use crate::orchestrator::RunOrchestrator;
use crate::thread::ThreadStore;
use crate::types::{Message, RunId, ThreadId};

/// Local bookkeeping about the run behind a reply.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub polls: u32,
    pub elapsed: Duration,
}

/// Result of one successful chat turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub thread_id: ThreadId,
    /// Full thread history in the collector's configured order.
    pub messages: Vec<Message>,
    pub run: RunSummary,
}

/// `chat(message, thread_id?) -> { thread_id, messages }`.
///
/// Resolves the thread, submits the message and waits for the run, then
/// fetches the thread's messages. On any failure the error is returned and
/// no partial reply is produced.
#[derive(Clone)]
pub struct ChatWorkflow {
    threads: ThreadStore,
    orchestrator: RunOrchestrator,
    collector: ResultCollector,
    options: RunOptions,
}

impl ChatWorkflow {
    pub fn new(api: Arc<dyn AssistantApi>, config: &AssistantConfig) -> Self {
        Self {
            threads: ThreadStore::new(Arc::clone(&api)),
            orchestrator: RunOrchestrator::new(Arc::clone(&api), config.assistant_id.clone())
                .with_admission(RunAdmission::new(config.max_concurrent_runs)),
            collector: ResultCollector::new(api, config.collector),
            options: config.run,
        }
    }

    /// Validate `config` and wire the workflow to the OpenAI HTTP API.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        config.validate()?;
        let api = OpenAiAssistants::new(
            config.api_key.clone(),
            &config.base_url,
            config.http_timeout,
        )?;
        Ok(Self::new(Arc::new(api), config))
    }

    pub fn run_options(&self) -> &RunOptions {
        &self.options
    }

    pub fn orchestrator(&self) -> &RunOrchestrator {
        &self.orchestrator
    }

    pub async fn chat(
        &self,
        message: &str,
        thread_id: Option<ThreadId>,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, AssistantError> {
        let mut exchange = Exchange::new();
        let outcome = self
            .run_exchange(&mut exchange, message, thread_id, cancel)
            .await;
        match &outcome {
            Ok(reply) => info!(
                thread_id = %reply.thread_id,
                run_id = %reply.run.run_id,
                messages = reply.messages.len(),
                polls = reply.run.polls,
                "chat exchange finished"
            ),
            Err(e) => warn!(
                phase = %exchange.phase(),
                code = e.code(),
                error = %e,
                "chat exchange failed"
            ),
        }
        outcome
    }

    async fn run_exchange(
        &self,
        exchange: &mut Exchange,
        message: &str,
        thread_id: Option<ThreadId>,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, AssistantError> {
        if cancel.is_cancelled() {
            exchange.advance(ExchangePhase::Cancelled);
            return Err(AssistantError::Cancelled { run_id: None });
        }

        let thread_id = self.threads.resolve(thread_id, cancel).await?;
        exchange.advance(ExchangePhase::ThreadResolved);

        let result = self
            .orchestrator
            .drive(exchange, &thread_id, message, &self.options, cancel)
            .await?;

        let messages = self.collector.fetch_messages(&thread_id, cancel).await?;
        exchange.advance(ExchangePhase::MessagesFetched);

        Ok(ChatReply {
            thread_id,
            messages,
            run: RunSummary {
                run_id: result.run.id,
                polls: result.polls,
                elapsed: result.elapsed,
            },
        })
    }
}
