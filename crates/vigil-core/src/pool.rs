//! Bounded worker pool with absolute-time scheduling.
//!
//! Requests posted to a manager become jobs on its pool; results travel
//! back through oneshot channels. Jobs are synchronous and short: the
//! heavy lifting (hashing, key generation) is CPU-bound and persistence
//! calls are quick by contract.
//!
//! `schedule_at` backs the session expiration handler: the job is held on
//! a timer task and enqueued when the deadline passes.
//!
//! Must be created inside a tokio runtime.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of workers draining a shared job queue.
#[derive(Debug)]
pub struct TaskPool {
    queue: mpsc::UnboundedSender<Job>,
}

impl TaskPool {
    /// Spawns `workers` worker tasks (at least one).
    pub fn new(workers: usize) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    // The receiver lock is only held while waiting for the
                    // next job, never while running one.
                    let job = { receiver.lock().await.recv().await };
                    match job {
                        Some(job) => job(),
                        None => break,
                    }
                }
                tracing::trace!(worker, "pool worker stopped");
            });
        }

        Self { queue }
    }

    /// Enqueues a job; returns `false` if the pool has shut down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.queue.send(Box::new(job)).is_ok()
    }

    /// Enqueues a job once `deadline` has passed.
    ///
    /// A deadline in the past enqueues immediately. The job is silently
    /// dropped if the pool shuts down before the deadline.
    pub fn schedule_at(&self, deadline: DateTime<Utc>, job: impl FnOnce() + Send + 'static) {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let delay = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;
            if queue.send(Box::new(job)).is_err() {
                tracing::trace!("scheduled job dropped; pool already shut down");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn jobs_run_and_resolve() {
        let pool = TaskPool::new(2);
        let (tx, rx) = oneshot::channel();
        assert!(pool.submit(move || {
            let _ = tx.send(41 + 1);
        }));
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn scheduled_jobs_fire_after_deadline() {
        let pool = TaskPool::new(1);
        let counter = Arc::new(AtomicU32::new(0));
        let (tx, rx) = oneshot::channel();

        let seen = Arc::clone(&counter);
        pool.schedule_at(Utc::now() + chrono::Duration::milliseconds(50), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        rx.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
