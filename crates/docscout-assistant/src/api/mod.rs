//! Upstream assistant service seam.
//!
//! [`AssistantApi`] is the contract the workflow expects from the hosted
//! assistant service: an identifier on every create call, a status on run
//! retrieval, and an ordered, cursor-paginated message listing.
//! [`OpenAiAssistants`] implements it over HTTP.

mod openai;

pub use openai::OpenAiAssistants;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::types::{Message, MessageOrder, Run, RunId, ThreadId};

/// One page request for [`AssistantApi::list_messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMessagesQuery {
    pub order: MessageOrder,
    /// Cursor: return messages after this message id.
    pub after: Option<String>,
    pub limit: u32,
}

/// One page of thread messages, in the requested order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub data: Vec<Message>,
    pub has_more: bool,
    /// Id of the last message in `data`; the cursor for the next page.
    pub last_id: Option<String>,
}

#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<ThreadId, UpstreamError>;

    /// Append a user message to `thread_id`. Returns the new message id.
    async fn create_message(&self, thread_id: &ThreadId, text: &str)
    -> Result<String, UpstreamError>;

    async fn create_run(&self, thread_id: &ThreadId, assistant_id: &str)
    -> Result<Run, UpstreamError>;

    async fn retrieve_run(&self, thread_id: &ThreadId, run_id: &RunId)
    -> Result<Run, UpstreamError>;

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        query: &ListMessagesQuery,
    ) -> Result<MessagePage, UpstreamError>;

    /// Ask upstream to stop `run_id`. Only issued when explicitly requested.
    async fn cancel_run(&self, thread_id: &ThreadId, run_id: &RunId)
    -> Result<Run, UpstreamError>;
}
