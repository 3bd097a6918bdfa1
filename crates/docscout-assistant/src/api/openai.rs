use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{AssistantApi, ListMessagesQuery, MessagePage};
use crate::error::{AssistantError, UpstreamError};
use crate::types::{Message, Role, Run, RunId, ThreadId, is_valid_id};

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

/// [`AssistantApi`] over the OpenAI Assistants v2 REST API.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl OpenAiAssistants {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AssistantError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AssistantError::Config(format!("invalid base url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AssistantError::Config(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Append `segments` to the base URL. Identifiers are checked so a
    /// caller-supplied thread id can never escape its path segment.
    fn endpoint(&self, operation: &'static str, segments: &[&str]) -> Result<Url, UpstreamError> {
        for segment in segments {
            if !is_valid_id(segment) {
                return Err(UpstreamError::invalid_request(
                    operation,
                    format!("invalid identifier {segment:?}"),
                ));
            }
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::invalid_request(operation, "base url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::network(operation, e.to_string()))?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "upstream responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::status(
                operation,
                status.as_u16(),
                error_detail(&body, status.canonical_reason()),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::decode(operation, e.to_string()))
    }
}

/// Pull `error.message` out of an upstream error body, falling back to the
/// raw body or the status reason.
fn error_detail(body: &str, reason: Option<&str>) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }

    if let Ok(envelope) = serde_json::from_str::<Envelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("no response body").to_owned()
    } else {
        trimmed.chars().take(512).collect()
    }
}

// ── wire types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Deserialize)]
struct WireMessage {
    id: String,
    thread_id: ThreadId,
    role: Role,
    created_at: i64,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TextValue {
    value: String,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let content = wire
            .content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.value),
                ContentPart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Message {
            id: wire.id,
            thread_id: wire.thread_id,
            role: wire.role,
            content,
            created_at: wire.created_at,
        }
    }
}

#[derive(Deserialize)]
struct WireMessageList {
    data: Vec<WireMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[async_trait]
impl AssistantApi for OpenAiAssistants {
    async fn create_thread(&self) -> Result<ThreadId, UpstreamError> {
        const OP: &str = "create thread";
        let url = self.endpoint(OP, &["threads"])?;
        let thread: IdObject = self
            .send(OP, self.request(Method::POST, url).json(&json!({})))
            .await?;
        Ok(ThreadId::from(thread.id))
    }

    async fn create_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
    ) -> Result<String, UpstreamError> {
        const OP: &str = "create message";
        let url = self.endpoint(OP, &["threads", thread_id.as_str(), "messages"])?;
        let body = json!({ "role": "user", "content": text });
        let message: IdObject = self
            .send(OP, self.request(Method::POST, url).json(&body))
            .await?;
        Ok(message.id)
    }

    async fn create_run(
        &self,
        thread_id: &ThreadId,
        assistant_id: &str,
    ) -> Result<Run, UpstreamError> {
        const OP: &str = "create run";
        let url = self.endpoint(OP, &["threads", thread_id.as_str(), "runs"])?;
        let body = json!({ "assistant_id": assistant_id });
        self.send(OP, self.request(Method::POST, url).json(&body))
            .await
    }

    async fn retrieve_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, UpstreamError> {
        const OP: &str = "retrieve run";
        let url = self.endpoint(OP, &["threads", thread_id.as_str(), "runs", run_id.as_str()])?;
        self.send(OP, self.request(Method::GET, url)).await
    }

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
        query: &ListMessagesQuery,
    ) -> Result<MessagePage, UpstreamError> {
        const OP: &str = "list messages";
        let mut url = self.endpoint(OP, &["threads", thread_id.as_str(), "messages"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("order", query.order.as_query())
                .append_pair("limit", &query.limit.to_string());
            if let Some(after) = &query.after {
                pairs.append_pair("after", after);
            }
        }
        let list: WireMessageList = self.send(OP, self.request(Method::GET, url)).await?;
        Ok(MessagePage {
            data: list.data.into_iter().map(Message::from).collect(),
            has_more: list.has_more,
            last_id: list.last_id,
        })
    }

    async fn cancel_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, UpstreamError> {
        const OP: &str = "cancel run";
        let url = self.endpoint(
            OP,
            &["threads", thread_id.as_str(), "runs", run_id.as_str(), "cancel"],
        )?;
        self.send(OP, self.request(Method::POST, url)).await
    }
}
