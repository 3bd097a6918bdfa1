use chrono::{DateTime, Utc};
use docscout_assistant::{ChatReply, Message, RunSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message. Must be non-blank and at most 32 KiB.
    pub message: String,
    /// Continue this thread; omit (or send blank) to start a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// One message of the thread history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageBody {
    pub id: String,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for ChatMessageBody {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role.to_string(),
            content: m.content,
            created_at: DateTime::from_timestamp(m.created_at, 0).unwrap_or_default(),
        }
    }
}

/// Bookkeeping about the run that produced the reply.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryBody {
    pub run_id: String,
    /// Status polls issued while waiting.
    pub polls: u32,
    pub elapsed_ms: u64,
}

impl From<RunSummary> for RunSummaryBody {
    fn from(run: RunSummary) -> Self {
        Self {
            run_id: run.run_id.to_string(),
            polls: run.polls,
            elapsed_ms: u64::try_from(run.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub thread_id: String,
    pub messages: Vec<ChatMessageBody>,
    pub run: RunSummaryBody,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            thread_id: reply.thread_id.into_inner(),
            messages: reply.messages.into_iter().map(Into::into).collect(),
            run: reply.run.into(),
        }
    }
}
