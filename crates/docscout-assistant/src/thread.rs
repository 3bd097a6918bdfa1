use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::AssistantApi;
use crate::error::AssistantError;
use crate::types::ThreadId;

/// Resolves the thread a chat turn belongs to.
///
/// A caller-supplied id is trusted as-is; the upstream service is the only
/// owner of thread state.
#[derive(Clone)]
pub struct ThreadStore {
    api: Arc<dyn AssistantApi>,
}

impl ThreadStore {
    pub fn new(api: Arc<dyn AssistantApi>) -> Self {
        Self { api }
    }

    /// Return `thread_id` unchanged, or create a new upstream thread when it
    /// is absent. Creation is not retried: a blind retry could leave an
    /// orphaned duplicate thread behind.
    ///
    /// A creation still in flight when `cancel` fires is abandoned.
    pub async fn resolve(
        &self,
        thread_id: Option<ThreadId>,
        cancel: &CancellationToken,
    ) -> Result<ThreadId, AssistantError> {
        if let Some(id) = thread_id {
            return Ok(id);
        }
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("thread creation abandoned: cancelled");
                return Err(AssistantError::Cancelled { run_id: None });
            }
            created = self.api.create_thread() => created,
        };
        match created {
            Ok(id) => {
                info!(thread_id = %id, "created thread");
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "thread creation failed");
                Err(AssistantError::ThreadCreation(e))
            }
        }
    }
}
