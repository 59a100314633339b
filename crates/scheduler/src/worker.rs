//! Fetch worker pool.
//!
//! Named worker threads pull jobs from a shared [`JobScheduler`], skip the
//! ones whose token was cancelled while queued, and hand the rest to an
//! executor callback.

use crate::{CancellationToken, JobScheduler};
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked by a worker for each live job.
///
/// The executor owns the payload and should re-check `token.is_cancelled()`
/// before publishing any result.
pub type JobExecutor<T> = Arc<dyn Fn(T, &CancellationToken) + Send + Sync>;

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// How long an idle worker sleeps before polling the queue again.
    /// Default: 5ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new(num_cpus())
    }
}

impl WorkerPoolConfig {
    /// Configuration with `num_workers` threads (at least one)
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Set how long idle workers sleep between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Pool of fetch worker threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tilegrid_scheduler::{
///     CancellationToken, JobPriority, JobScheduler, WorkerPool, WorkerPoolConfig,
/// };
///
/// let scheduler = Arc::new(JobScheduler::<String>::new());
/// let executor = Arc::new(|key: String, token: &CancellationToken| {
///     if !token.is_cancelled() {
///         println!("fetching {key}");
///     }
/// });
///
/// let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(2)).unwrap();
/// scheduler.submit(JobPriority::Visible, "0,0".to_string(), CancellationToken::new());
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `config.num_workers` threads serving `scheduler`.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn a thread. Threads spawned
    /// before the failure are signalled to stop.
    pub fn new<T: Send + 'static>(
        scheduler: Arc<JobScheduler<T>>,
        executor: JobExecutor<T>,
        config: WorkerPoolConfig,
    ) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.num_workers);

        for id in 0..config.num_workers {
            let scheduler = Arc::clone(&scheduler);
            let executor = Arc::clone(&executor);
            let stop = Arc::clone(&shutdown);
            let poll_interval = config.poll_interval;

            let spawned = thread::Builder::new()
                .name(format!("tilegrid-fetch-{id}"))
                .spawn(move || run(&scheduler, &executor, &stop, poll_interval));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    shutdown.store(true, Ordering::Release);
                    return Err(err);
                }
            }
        }

        tracing::debug!(workers = workers.len(), "fetch worker pool started");
        Ok(Self { workers, shutdown })
    }

    /// Number of worker threads spawned
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` once shutdown has been signalled
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Signal all workers to stop and wait for them to exit.
    ///
    /// Jobs still queued are left in the scheduler.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("fetch worker panicked before shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run<T>(
    scheduler: &JobScheduler<T>,
    executor: &JobExecutor<T>,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) {
    while !shutdown.load(Ordering::Acquire) {
        let Some(job) = scheduler.next_job() else {
            thread::sleep(poll_interval);
            continue;
        };

        let token = scheduler.get_cancellation_token(job.id).unwrap_or_default();
        if token.is_cancelled() {
            tracing::trace!(job = job.id, "skipping cancelled fetch");
            scheduler.discard_job(job.id);
            continue;
        }

        executor(job.payload, &token);
        scheduler.complete_job(job.id);
    }
}

fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobPriority;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert!(config.num_workers > 0);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_worker_pool_config_never_zero() {
        assert_eq!(WorkerPoolConfig::new(0).num_workers, 1);
    }

    #[test]
    fn test_worker_pool_executes_jobs() {
        let scheduler = Arc::new(JobScheduler::new());
        let executed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executed);
        let executor: JobExecutor<u32> =
            Arc::new(move |_job: u32, _token: &CancellationToken| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let pool = WorkerPool::new(Arc::clone(&scheduler), executor, WorkerPoolConfig::new(2))
            .unwrap();
        assert_eq!(pool.num_workers(), 2);

        for i in 0..5 {
            scheduler.submit(JobPriority::Visible, i, CancellationToken::new());
        }

        assert!(wait_until(Duration::from_secs(2), || {
            executed.load(Ordering::SeqCst) == 5
        }));
        pool.shutdown();
        assert_eq!(scheduler.stats().jobs_completed, 5);
    }

    #[test]
    fn test_worker_pool_skips_cancelled_jobs() {
        let scheduler = Arc::new(JobScheduler::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let executor: JobExecutor<&'static str> =
            Arc::new(move |key: &'static str, _token: &CancellationToken| {
                sink.lock().unwrap().push(key);
            });

        let stale = CancellationToken::new();
        scheduler.submit(JobPriority::Visible, "stale", stale.clone());
        scheduler.submit(JobPriority::Margin, "live", CancellationToken::new());
        stale.cancel();

        let pool = WorkerPool::new(Arc::clone(&scheduler), executor, WorkerPoolConfig::new(1))
            .unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            scheduler.stats().pending_jobs() == 0
        }));
        pool.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["live"]);
        assert_eq!(scheduler.stats().jobs_cancelled, 1);
    }

    #[test]
    fn test_drop_stops_workers() {
        let scheduler = Arc::new(JobScheduler::<()>::new());
        let executor: JobExecutor<()> = Arc::new(|_: (), _: &CancellationToken| {});
        let pool = WorkerPool::new(scheduler, executor, WorkerPoolConfig::new(3)).unwrap();
        assert!(!pool.is_shutting_down());
        drop(pool);
    }
}
