//! Cancellation tokens for tile content loads
//!
//! A token is shared between the tile that requested a load and the worker
//! that performs it. The tile cancels when it is rebound or evicted; the worker
//! checks the token before fetching and again before delivering a result.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::JobId;

/// Cancellation token for cooperative load cancellation
///
/// Clones share the same underlying flag, so cancelling any clone is observed
/// by all of them.
///
/// # Example
///
/// ```
/// use tilegrid_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token (idempotent)
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once `cancel()` has been called on this token or any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `true` if both tokens share the same flag
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Associates job IDs with their cancellation tokens
///
/// The scheduler registers a token per submitted job so workers can look it
/// up when they pick the job, and so queued jobs can be cancelled by ID.
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<JobId, CancellationToken>>,
}

impl CancellationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        // A poisoned registry only means a worker panicked mid-update; the map
        // itself is still consistent.
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `token` under `job_id`, replacing any previous entry
    pub fn register(&self, job_id: JobId, token: CancellationToken) {
        self.lock().insert(job_id, token);
    }

    /// Cancel a job by ID. Returns `true` if the job was registered.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.lock().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered job, returning how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let tokens = self.lock();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    /// Remove a job from the registry. Returns `true` if it was present.
    pub fn unregister(&self, job_id: JobId) -> bool {
        self.lock().remove(&job_id).is_some()
    }

    /// Token for a job, if it is still registered
    pub fn get(&self, job_id: JobId) -> Option<CancellationToken> {
        self.lock().get(&job_id).cloned()
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no jobs are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all entries without cancelling them
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
