//! Cache-backed content loader
//!
//! [`CachingLoader`] answers grid load requests from the [`ContentCache`]
//! when it can and queues a fetch on the worker pool when it cannot. Fetches
//! for tiles on screen run before fetches for the buffer ring.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tilegrid_core::{
    CancellationToken, CompletionSink, ContentLoader, LoadError, LoadHandle, LoadRequest,
};
use tilegrid_scheduler::{JobExecutor, JobScheduler, WorkerPool, WorkerPoolConfig};

use crate::ram::{CacheLookup, CachedContent, ContentCache};
use crate::source::{ContentSource, FetchRequest};

/// Snapshot of loader activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub requests: u64,
    pub cache_hits: u64,
    /// Requests whose cached entry was too small and had to be fetched again
    pub refetches: u64,
    pub fetched: u64,
    pub failed: u64,
    /// Fetches abandoned because their tile moved on
    pub cancelled: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    refetches: AtomicU64,
    fetched: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LoaderStats {
        LoaderStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            refetches: self.refetches.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

struct FetchJob {
    request: FetchRequest,
    sink: CompletionSink,
}

pub struct CachingLoader<S> {
    cache: Arc<ContentCache>,
    source: Arc<S>,
    scheduler: Arc<JobScheduler<FetchJob>>,
    workers: WorkerPool,
    counters: Arc<Counters>,
}

impl<S: ContentSource> CachingLoader<S> {
    /// Start the fetch workers
    ///
    /// # Errors
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(source: S, cache: Arc<ContentCache>, config: WorkerPoolConfig) -> io::Result<Self> {
        let source = Arc::new(source);
        let scheduler = Arc::new(JobScheduler::new());
        let counters = Arc::new(Counters::default());

        let executor: JobExecutor<FetchJob> = {
            let cache = Arc::clone(&cache);
            let source = Arc::clone(&source);
            let counters = Arc::clone(&counters);
            Arc::new(move |job: FetchJob, token: &CancellationToken| {
                run_fetch(job, token, source.as_ref(), &cache, &counters)
            })
        };
        let workers = WorkerPool::new(Arc::clone(&scheduler), executor, config)?;

        Ok(Self {
            cache,
            source,
            scheduler,
            workers,
            counters,
        })
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> LoaderStats {
        self.counters.snapshot()
    }

    /// Fetches queued but not yet picked up by a worker
    pub fn pending_jobs(&self) -> usize {
        self.scheduler.pending_jobs()
    }

    /// Drop queued fetches whose tiles have already moved on
    pub fn purge_cancelled(&self) -> usize {
        let purged = self.scheduler.purge_cancelled();
        if purged > 0 {
            tracing::debug!(purged, "dropped cancelled fetches");
        }
        purged
    }

    pub fn num_workers(&self) -> usize {
        self.workers.num_workers()
    }

    /// Cancel queued fetches and stop the workers
    pub fn shutdown(self) {
        self.scheduler.clear();
        self.workers.shutdown();
    }
}

impl<S: ContentSource> ContentLoader for CachingLoader<S> {
    fn load(&self, request: LoadRequest) -> LoadHandle {
        let handle = request.handle();
        let LoadRequest {
            key,
            coordinate,
            pixel_size,
            priority,
            sink,
        } = request;
        Counters::bump(&self.counters.requests);

        let variant = match self.cache.lookup(&key, pixel_size) {
            CacheLookup::Hit(content) => {
                Counters::bump(&self.counters.cache_hits);
                sink.complete(Ok(content));
                return handle;
            }
            CacheLookup::Undersized { variant } => {
                Counters::bump(&self.counters.refetches);
                tracing::trace!(%key, pixel_size, "cached content too small; refetching");
                variant
            }
            CacheLookup::Miss => None,
        };

        let token = sink.token().clone();
        let job = FetchJob {
            request: FetchRequest {
                key,
                coordinate,
                pixel_size,
                variant,
            },
            sink,
        };
        self.scheduler.submit(priority, job, token);
        handle
    }
}

fn run_fetch<S: ContentSource>(
    job: FetchJob,
    token: &CancellationToken,
    source: &S,
    cache: &ContentCache,
    counters: &Counters,
) {
    let FetchJob { request, sink } = job;
    match source.fetch(&request, token) {
        Ok(fetched) => {
            let mut entry = CachedContent::new(fetched.content.clone(), fetched.variant);
            entry.complete = fetched.complete;
            // The token is re-checked under the cache lock; once stored, the
            // fetch counts as finished even if the tile moves on right after.
            if cache.put_unless_cancelled(&request.key, entry, token) {
                Counters::bump(&counters.fetched);
                sink.complete(Ok(fetched.content));
            } else {
                Counters::bump(&counters.cancelled);
                tracing::trace!(key = %request.key, "fetch cancelled");
            }
        }
        Err(LoadError::Cancelled) => {
            Counters::bump(&counters.cancelled);
            tracing::trace!(key = %request.key, "fetch cancelled");
        }
        Err(err) => {
            Counters::bump(&counters.failed);
            tracing::debug!(key = %request.key, error = %err, "fetch failed");
            sink.complete(Err(err));
        }
    }
}
