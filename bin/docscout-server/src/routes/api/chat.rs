//! Assistant chat route.
//!
//! One request is one chat turn: resolve or create the thread, submit the
//! message, wait for the run and return the full thread history.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use docscout_assistant::ThreadId;
use tracing::{debug, warn};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::chat::{ChatMessageBody, ChatRequest, ChatResponse, RunSummaryBody};
use crate::state::AppState;

/// Maximum accepted message length in bytes.
const MAX_MESSAGE_BYTES: usize = 32 * 1024;

/// How long a timed-out exchange may keep the response waiting while it
/// unwinds.
const CLEANUP_GRACE: Duration = Duration::from_secs(1);

#[derive(OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(ChatRequest, ChatResponse, ChatMessageBody, RunSummaryBody))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Send a message to the assistant (`POST /api/chat`).
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Run completed; full thread history", body = ChatResponse),
        (status = 400, description = "Blank or oversized message, or malformed threadId"),
        (status = 403, description = "Origin not allowed"),
        (status = 502, description = "Upstream rejected a call or the run failed"),
        (status = 503, description = "Upstream unreachable or server shutting down"),
        (status = 504, description = "Run did not finish in time"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let message = req.message.trim();
    if message.is_empty() {
        return Err(ServerError::BadRequest("message must not be empty".into()));
    }
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message exceeds {MAX_MESSAGE_BYTES} bytes"
        )));
    }
    let thread_id = match req.thread_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(ThreadId::parse(raw).ok_or_else(|| {
            ServerError::BadRequest(format!("threadId {raw:?} is not a valid thread id"))
        })?),
    };

    let cancel = state.shutdown.child_token();
    // A client that goes away stops the exchange as well.
    let _cancel_on_drop = cancel.clone().drop_guard();
    let timeout = state.config.chat_timeout();
    let mut exchange = tokio::spawn({
        let state = Arc::clone(&state);
        let message = message.to_owned();
        let cancel = cancel.clone();
        async move { state.chat.chat(&message, thread_id, &cancel).await }
    });

    let reply = tokio::select! {
        joined = &mut exchange => joined.map_err(|e| ServerError::Internal(e.to_string()))??,
        _ = tokio::time::sleep(timeout) => {
            // The workflow gets a short grace period to observe the
            // cancellation so an opted-in upstream cancel still goes out. Past
            // that it keeps unwinding in the background.
            cancel.cancel();
            match tokio::time::timeout(CLEANUP_GRACE, &mut exchange).await {
                Ok(Ok(Err(e))) => debug!(error = %e, "chat exchange stopped after caller timeout"),
                Ok(Ok(Ok(_))) => debug!("chat exchange finished after caller timeout"),
                Ok(Err(e)) => warn!(error = %e, "chat exchange task failed"),
                Err(_) => debug!("chat exchange still unwinding after caller timeout"),
            }
            warn!(timeout_secs = timeout.as_secs(), "chat exchange timed out");
            return Err(ServerError::Timeout(timeout));
        }
    };

    Ok(Json(reply.into()))
}
