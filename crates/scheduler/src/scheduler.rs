//! Job scheduler implementation
//!
//! Combines the priority queue with the cancellation registry and keeps
//! submission statistics.

use crate::cancel::{CancellationRegistry, CancellationToken};
use crate::priority::{Job, JobId, JobPriority, PriorityQueue};
use std::sync::Mutex;

/// Job scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total jobs submitted
    pub jobs_submitted: u64,

    /// Total jobs that ran to completion
    pub jobs_completed: u64,

    /// Total jobs dropped because their token was cancelled
    pub jobs_cancelled: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Jobs submitted but neither completed nor cancelled yet
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_cancelled
    }
}

/// Job scheduler with priority queue
///
/// Thread-safe. The submitter supplies the cancellation token so the same
/// token can also be handed to whoever owns the request (a tile, for loads).
///
/// # Example
///
/// ```
/// use tilegrid_scheduler::{CancellationToken, JobPriority, JobScheduler};
///
/// let scheduler = JobScheduler::new();
/// let token = CancellationToken::new();
/// let job_id = scheduler.submit(JobPriority::Visible, "3,-2", token.clone());
///
/// let job = scheduler.next_job().unwrap();
/// assert_eq!(job.id, job_id);
/// scheduler.complete_job(job.id);
/// ```
pub struct JobScheduler<T> {
    queue: PriorityQueue<T>,
    stats: Mutex<SchedulerStats>,
    cancellation: CancellationRegistry,
}

impl<T> JobScheduler<T> {
    /// Create a scheduler with an empty queue
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            stats: Mutex::new(SchedulerStats::default()),
            cancellation: CancellationRegistry::new(),
        }
    }

    fn stats_mut(&self) -> std::sync::MutexGuard<'_, SchedulerStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a job with the given priority and cancellation token
    pub fn submit(&self, priority: JobPriority, payload: T, token: CancellationToken) -> JobId {
        let job_id = self.queue.push(priority, payload);
        self.cancellation.register(job_id, token);
        self.stats_mut().jobs_submitted += 1;
        job_id
    }

    /// Pop the highest priority job
    ///
    /// The job's token stays registered until `complete_job()` or
    /// `discard_job()` is called for it.
    pub fn next_job(&self) -> Option<Job<T>> {
        self.queue.pop()
    }

    /// Mark a job as having run to completion
    pub fn complete_job(&self, job_id: JobId) {
        self.stats_mut().jobs_completed += 1;
        self.cancellation.unregister(job_id);
    }

    /// Mark a popped job as dropped because it was cancelled
    pub fn discard_job(&self, job_id: JobId) {
        self.stats_mut().jobs_cancelled += 1;
        self.cancellation.unregister(job_id);
    }

    /// Cancel a specific job by ID
    ///
    /// Queued jobs are removed immediately; a running job only sees its token
    /// flip and is expected to notice cooperatively.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        let found = self.cancellation.cancel(job_id);
        let removed = self.queue.remove_if(|job| job.id == job_id);
        if !removed.is_empty() {
            self.discard_job(job_id);
        }
        found
    }

    /// Drop every queued job whose token has already been cancelled
    ///
    /// Returns the number of jobs purged.
    pub fn purge_cancelled(&self) -> usize {
        let removed = self.queue.remove_if(|job| {
            self.cancellation
                .get(job.id)
                .is_some_and(|token| token.is_cancelled())
        });
        for job_id in &removed {
            self.discard_job(*job_id);
        }
        removed.len()
    }

    /// Cancel and drop every queued job
    pub fn clear(&self) {
        self.cancellation.cancel_all();
        for job_id in self.queue.clear() {
            self.discard_job(job_id);
        }
    }

    /// Number of jobs queued but not yet picked up by a worker
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Check if any jobs are queued
    pub fn has_pending_jobs(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Snapshot of scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats_mut().clone();
        stats.queue_size = self.queue.len();
        stats
    }

    /// Token registered for a job, if it has not finished yet
    pub fn get_cancellation_token(&self, job_id: JobId) -> Option<CancellationToken> {
        self.cancellation.get(job_id)
    }
}

impl<T> Default for JobScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_basic() {
        let scheduler = JobScheduler::new();
        assert!(!scheduler.has_pending_jobs());

        let token = CancellationToken::new();
        let job_id = scheduler.submit(JobPriority::Visible, "0,0", token.clone());
        assert_eq!(scheduler.pending_jobs(), 1);

        let job = scheduler.next_job().unwrap();
        assert_eq!(job.id, job_id);
        assert!(scheduler
            .get_cancellation_token(job_id)
            .is_some_and(|t| t.same_as(&token)));

        scheduler.complete_job(job_id);

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_submitted, 1);
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.pending_jobs(), 0);
        assert!(scheduler.get_cancellation_token(job_id).is_none());
    }

    #[test]
    fn test_cancel_queued_job() {
        let scheduler = JobScheduler::new();
        let token = CancellationToken::new();
        let job_id = scheduler.submit(JobPriority::Margin, 1, token.clone());

        assert!(scheduler.cancel_job(job_id));
        assert!(token.is_cancelled());
        assert!(scheduler.next_job().is_none());
        assert_eq!(scheduler.stats().jobs_cancelled, 1);
    }

    #[test]
    fn test_purge_cancelled() {
        let scheduler = JobScheduler::new();
        let stale = CancellationToken::new();
        let live = CancellationToken::new();
        scheduler.submit(JobPriority::Visible, "stale", stale.clone());
        scheduler.submit(JobPriority::Visible, "live", live);

        stale.cancel();
        assert_eq!(scheduler.purge_cancelled(), 1);
        assert_eq!(scheduler.next_job().unwrap().payload, "live");
    }

    #[test]
    fn test_clear_cancels_everything() {
        let scheduler = JobScheduler::new();
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        scheduler.submit(JobPriority::Visible, (), a.clone());
        scheduler.submit(JobPriority::Margin, (), b.clone());

        scheduler.clear();
        assert!(a.is_cancelled() && b.is_cancelled());

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_cancelled, 2);
        assert_eq!(stats.queue_size, 0);
    }
}
