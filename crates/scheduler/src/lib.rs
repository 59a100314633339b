//! Tilegrid Scheduler Library
//!
//! Priority job queue, cooperative cancellation tokens and the worker pool
//! that runs tile content fetches off the UI thread.
//!
//! Jobs for tiles intersecting the viewport are served before jobs for tiles
//! in the buffer margin, FIFO within a priority level. A job whose token was
//! cancelled while it waited is dropped without running.
//!
//! # Example
//!
//! ```
//! use tilegrid_scheduler::{CancellationToken, JobPriority, JobScheduler};
//!
//! let scheduler = JobScheduler::new();
//! let token = CancellationToken::new();
//! scheduler.submit(JobPriority::Margin, "4,1", token.clone());
//!
//! // The tile moved on before a worker picked the job up.
//! token.cancel();
//! assert_eq!(scheduler.purge_cancelled(), 1);
//! ```

mod cancel;
mod priority;
mod scheduler;
mod worker;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use priority::{Job, JobId, JobPriority, PriorityQueue};
pub use scheduler::{JobScheduler, SchedulerStats};
pub use worker::{JobExecutor, WorkerPool, WorkerPoolConfig};
