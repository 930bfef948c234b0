//! Bounded worker pool with an explicit drain barrier

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Why a submitted unit produced no value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The concurrency gate was closed before a slot was granted.
    #[error("concurrency gate closed before the task started")]
    GateClosed,

    /// The task panicked while running.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled by the runtime.
    #[error("task cancelled")]
    Cancelled,
}

/// Runs submitted units as independent tasks, at most `max_concurrency` at a
/// time.
///
/// `submit` never waits: the unit is spawned immediately and waits for a gate
/// slot inside its own task. The slot is an owned permit held for the whole
/// unit and released on drop, so it is returned on every exit path.
/// [`WorkerPool::drain`] is the barrier that collects one result per unit.
pub struct WorkerPool<T> {
    gate: Arc<Semaphore>,
    tasks: JoinSet<Result<T, TaskError>>,
    max_concurrency: usize,
    submitted: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool; `max_concurrency` must be > 0.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(max_concurrency)),
            tasks: JoinSet::new(),
            max_concurrency,
            submitted: 0,
        }
    }

    /// Spawn one unit of work behind the concurrency gate.
    pub fn submit<F>(&mut self, work: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let gate = Arc::clone(&self.gate);
        self.submitted += 1;

        self.tasks.spawn(async move {
            match gate.acquire_owned().await {
                Ok(_permit) => Ok::<T, TaskError>(work.await),
                Err(_) => Err(TaskError::GateClosed),
            }
        });
    }

    /// Units submitted so far
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Units not yet collected by `drain`
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Gate slots currently free
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Wait for every submitted unit and return exactly one result per unit.
    ///
    /// Results arrive in completion order, not submission order.
    pub async fn drain(mut self) -> Vec<Result<T, TaskError>> {
        let mut results = Vec::with_capacity(self.tasks.len());

        while let Some(joined) = self.tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(TaskError::Cancelled),
            };
            results.push(result);
        }

        results
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_collects_every_unit() {
        let mut pool = WorkerPool::new(4);
        for i in 0..100usize {
            pool.submit(async move { i });
        }
        assert_eq!(pool.submitted(), 100);

        let mut values: Vec<usize> = pool.drain().await.into_iter().map(Result::unwrap).collect();
        values.sort_unstable();

        assert_eq!(values, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_bounds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(3);

        for _ in 0..30 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.submit(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        let results = pool.drain().await;

        assert_eq!(results.len(), 30);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    async fn explode() -> i32 {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_slot_released() {
        let mut pool = WorkerPool::new(1);
        pool.submit(explode());
        pool.submit(async { 7 });

        let results = pool.drain().await;

        assert_eq!(results.len(), 2);
        assert!(results.contains(&Ok(7)));
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(TaskError::Panicked(msg)) if msg == "boom")));
    }
}
