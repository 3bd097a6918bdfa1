use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::AssistantError;
use crate::types::ThreadId;

/// RAII guard for one waiting-run slot. Dropping it frees the slot.
pub struct RunPermit {
    #[allow(dead_code)]
    permit: Option<OwnedSemaphorePermit>,
}

impl std::fmt::Debug for RunPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunPermit").finish()
    }
}

/// Local cap on runs being submitted and waited on concurrently.
///
/// Callers beyond the cap queue on the semaphore instead of failing; the
/// wait is itself cancellable.
#[derive(Debug, Clone, Default)]
pub struct RunAdmission {
    /// `None` means unlimited.
    semaphore: Option<Arc<Semaphore>>,
}

impl RunAdmission {
    pub fn unlimited() -> Self {
        Self { semaphore: None }
    }

    /// `max_concurrent == 0` disables the cap.
    pub fn new(max_concurrent: usize) -> Self {
        if max_concurrent == 0 {
            return Self::unlimited();
        }
        Self {
            semaphore: Some(Arc::new(Semaphore::new(max_concurrent))),
        }
    }

    /// Free slots, or `None` when unlimited.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Wait for a slot, or fail with [`AssistantError::Cancelled`].
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<RunPermit, AssistantError> {
        let Some(semaphore) = self.semaphore.clone() else {
            return Ok(RunPermit { permit: None });
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AssistantError::Cancelled { run_id: None }),
            permit = semaphore.acquire_owned() => permit
                .map(|p| RunPermit { permit: Some(p) })
                // The semaphore is never closed.
                .map_err(|_| AssistantError::Cancelled { run_id: None }),
        }
    }
}

type LockMap = HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>;

/// Serializes exchanges per thread, so this process never has two runs
/// active on the same thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Held while a run on `thread_id` is being submitted and waited on.
pub struct ThreadGuard {
    thread_id: ThreadId,
    locks: ThreadLocks,
    #[allow(dead_code)]
    guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for ThreadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGuard")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other exchange holds `thread_id`.
    pub async fn lock(
        &self,
        thread_id: &ThreadId,
        cancel: &CancellationToken,
    ) -> Result<ThreadGuard, AssistantError> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(thread_id.clone()).or_default())
        };
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = Arc::clone(&mutex).lock_owned() => Some(guard),
        };
        drop(mutex);
        let Some(guard) = guard else {
            self.prune(thread_id, 1);
            return Err(AssistantError::Cancelled { run_id: None });
        };
        Ok(ThreadGuard {
            thread_id: thread_id.clone(),
            locks: self.clone(),
            guard,
        })
    }

    /// Drop the entry for `thread_id` if at most `holders` references to it
    /// remain (the map's own included).
    fn prune(&self, thread_id: &ThreadId, holders: usize) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(thread_id)
            .is_some_and(|m| Arc::strong_count(m) <= holders)
        {
            map.remove(thread_id);
        }
    }

    /// Number of threads currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        // One reference in the map, one held by our guard: nobody is waiting.
        self.locks.prune(&self.thread_id, 2);
    }
}
