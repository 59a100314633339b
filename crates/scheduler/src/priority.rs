//! Priority queue for tile fetch jobs
//!
//! Jobs for tiles inside the visible viewport run before jobs for tiles in the
//! buffer margin. Within a priority level, jobs run in submission order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

/// Job priority levels
///
/// Higher numeric values have higher priority and are executed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Tile in the buffer margin around the viewport
    Margin = 0,

    /// Tile intersecting the visible viewport
    Visible = 1,
}

/// Unique job identifier
pub type JobId = u64;

/// A scheduled job carrying a payload of type `T`
///
/// Ordered by priority (higher first), then by insertion order (earlier first).
#[derive(Debug)]
pub struct Job<T> {
    /// Unique job identifier
    pub id: JobId,

    /// Job priority level
    pub priority: JobPriority,

    /// Work to hand to the executor
    pub payload: T,

    /// Insertion order (used for FIFO within same priority)
    insertion_order: u64,
}

impl<T> Job<T> {
    /// Create a new job
    pub fn new(id: JobId, priority: JobPriority, payload: T, insertion_order: u64) -> Self {
        Self {
            id,
            priority,
            payload,
            insertion_order,
        }
    }
}

impl<T> PartialEq for Job<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Job<T> {}

impl<T> PartialOrd for Job<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Job<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertions must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Thread-safe priority queue of jobs
///
/// Higher priority jobs are dequeued first; within a priority level jobs
/// come out in the order they were pushed.
pub struct PriorityQueue<T> {
    state: Mutex<QueueState<T>>,
}

struct QueueState<T> {
    /// Binary heap for priority-ordered jobs (max heap)
    heap: BinaryHeap<Job<T>>,

    /// Next job ID (for automatic ID assignment)
    next_job_id: JobId,

    /// Insertion counter (for FIFO ordering within same priority)
    insertion_counter: u64,
}

impl<T> PriorityQueue<T> {
    /// Create a new empty priority queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_job_id: 1,
                insertion_counter: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push a job onto the queue
    ///
    /// The job is assigned a unique ID and placed according to its priority.
    /// Returns the assigned job ID.
    pub fn push(&self, priority: JobPriority, payload: T) -> JobId {
        let mut state = self.lock();
        let job_id = state.next_job_id;
        state.next_job_id += 1;

        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        state
            .heap
            .push(Job::new(job_id, priority, payload, insertion_order));
        job_id
    }

    /// Pop the highest priority job from the queue
    ///
    /// Returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<Job<T>> {
        self.lock().heap.pop()
    }

    /// Get the number of jobs in the queue
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Drop all queued jobs, returning their IDs
    pub fn clear(&self) -> Vec<JobId> {
        let mut state = self.lock();
        state.heap.drain().map(|job| job.id).collect()
    }

    /// Remove all jobs matching `predicate`, returning the removed IDs
    ///
    /// Used to purge jobs whose cancellation token has fired. Remaining jobs
    /// keep their relative order.
    pub fn remove_if<F>(&self, predicate: F) -> Vec<JobId>
    where
        F: Fn(&Job<T>) -> bool,
    {
        let mut state = self.lock();
        let (removed, remaining): (Vec<_>, Vec<_>) =
            state.heap.drain().partition(|job| predicate(job));
        state.heap = remaining.into_iter().collect();
        removed.into_iter().map(|job| job.id).collect()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_priority_ordering() {
        assert!(JobPriority::Visible > JobPriority::Margin);
    }

    #[test]
    fn test_priority_queue_basic() {
        let queue = PriorityQueue::new();
        assert!(queue.is_empty());

        let id = queue.push(JobPriority::Visible, "0,0");
        assert_eq!(queue.len(), 1);

        let job = queue.pop().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.payload, "0,0");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_visible_before_margin() {
        let queue = PriorityQueue::new();
        queue.push(JobPriority::Margin, "margin");
        queue.push(JobPriority::Visible, "visible");

        assert_eq!(queue.pop().unwrap().payload, "visible");
        assert_eq!(queue.pop().unwrap().payload, "margin");
    }

    #[test]
    fn test_fifo_within_same_priority() {
        let queue = PriorityQueue::new();
        let first = queue.push(JobPriority::Margin, 1);
        let second = queue.push(JobPriority::Margin, 2);
        let third = queue.push(JobPriority::Margin, 3);

        assert_eq!(queue.pop().unwrap().id, first);
        assert_eq!(queue.pop().unwrap().id, second);
        assert_eq!(queue.pop().unwrap().id, third);
    }

    #[test]
    fn test_remove_if() {
        let queue = PriorityQueue::new();
        queue.push(JobPriority::Visible, 1);
        let even = queue.push(JobPriority::Margin, 2);
        queue.push(JobPriority::Visible, 3);

        let removed = queue.remove_if(|job| job.payload % 2 == 0);
        assert_eq!(removed, vec![even]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_clear_returns_ids() {
        let queue = PriorityQueue::new();
        queue.push(JobPriority::Visible, ());
        queue.push(JobPriority::Margin, ());

        assert_eq!(queue.clear().len(), 2);
        assert!(queue.is_empty());
    }
}
