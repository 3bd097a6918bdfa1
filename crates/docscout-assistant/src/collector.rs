use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{AssistantApi, ListMessagesQuery};
use crate::config::CollectorConfig;
use crate::error::AssistantError;
use crate::types::{Message, MessageOrder, ThreadId};

const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Reads the full message history of a thread once its run has settled.
///
/// Messages come back in [`CollectorConfig::order`] exactly as upstream
/// returned them; pages are concatenated, never re-sorted.
#[derive(Clone)]
pub struct ResultCollector {
    api: Arc<dyn AssistantApi>,
    config: CollectorConfig,
}

impl ResultCollector {
    pub fn new(api: Arc<dyn AssistantApi>, config: CollectorConfig) -> Self {
        Self { api, config }
    }

    pub fn order(&self) -> MessageOrder {
        self.config.order
    }

    /// Read every page of `thread_id`. Stops with
    /// [`AssistantError::Cancelled`] as soon as `cancel` fires.
    pub async fn fetch_messages(
        &self,
        thread_id: &ThreadId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, AssistantError> {
        let mut messages = Vec::new();
        let mut after: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let query = ListMessagesQuery {
                order: self.config.order,
                after: after.clone(),
                limit: self.config.page_size,
            };
            let page = self.fetch_page(thread_id, &query, cancel).await?;
            pages += 1;

            let more = page.has_more && !page.data.is_empty();
            let cursor = page.last_id;
            messages.extend(page.data);

            match cursor {
                Some(next) if more && after.as_deref() != Some(next.as_str()) => after = Some(next),
                _ => break,
            }
        }

        debug!(thread_id = %thread_id, count = messages.len(), pages, "messages fetched");
        Ok(messages)
    }

    async fn fetch_page(
        &self,
        thread_id: &ThreadId,
        query: &ListMessagesQuery,
        cancel: &CancellationToken,
    ) -> Result<crate::api::MessagePage, AssistantError> {
        let mut attempt = 0u32;
        loop {
            let listed = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                listed = self.api.list_messages(thread_id, query) => Some(listed),
            };
            let Some(listed) = listed else {
                info!(thread_id = %thread_id, "message fetch abandoned: cancelled");
                return Err(AssistantError::Cancelled { run_id: None });
            };
            match listed {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(thread_id = %thread_id, error = %e, attempt, "message listing failed; retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(RETRY_DELAY * attempt) => {}
                    }
                }
                Err(e) => {
                    warn!(thread_id = %thread_id, error = %e, "message listing failed");
                    return Err(AssistantError::MessageFetch(e));
                }
            }
        }
    }
}
