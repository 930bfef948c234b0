//! Fake presence clients and probes shared by the engine tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use loadscout_core::{
    aggregate, CapacityProbe, ClientId, CoreResult, Outcome, PresenceClient, RunMetrics,
};

/// Succeeds after a fixed latency and counts calls by operation.
pub struct FixedLatencyClient {
    latency: Duration,
    heartbeats: AtomicUsize,
    batches: AtomicUsize,
    batch_ids: AtomicUsize,
}

impl FixedLatencyClient {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            heartbeats: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            batch_ids: AtomicUsize::new(0),
        }
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn batch_ids(&self) -> usize {
        self.batch_ids.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.heartbeats() + self.batches()
    }
}

#[async_trait]
impl PresenceClient for FixedLatencyClient {
    async fn send_heartbeat(&self, _id: &ClientId) -> Outcome {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Outcome::success(self.latency)
    }

    async fn send_status_batch(&self, ids: &[ClientId]) -> Outcome {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.batch_ids.fetch_add(ids.len(), Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Outcome::success(self.latency)
    }
}

/// Tracks how many calls are inside the client at once.
pub struct ConcurrencyTracker {
    hold: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Outcome::success(self.hold)
    }
}

#[async_trait]
impl PresenceClient for ConcurrencyTracker {
    async fn send_heartbeat(&self, _id: &ClientId) -> Outcome {
        self.enter().await
    }

    async fn send_status_batch(&self, _ids: &[ClientId]) -> Outcome {
        self.enter().await
    }
}

/// Holds every call for `hold` and fails all calls that arrive while more
/// than `limit` are already in flight. Reports `reported_latency` for calls
/// that succeed.
pub struct SaturatingClient {
    limit: usize,
    hold: Duration,
    reported_latency: Duration,
    active: AtomicUsize,
}

impl SaturatingClient {
    pub fn new(limit: usize, hold: Duration, reported_latency: Duration) -> Self {
        Self {
            limit,
            hold,
            reported_latency,
            active: AtomicUsize::new(0),
        }
    }

    async fn enter(&self) -> Outcome {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if now > self.limit {
            Outcome::protocol(503, format!("{now} concurrent clients"), self.hold)
        } else {
            Outcome::success(self.reported_latency)
        }
    }
}

#[async_trait]
impl PresenceClient for SaturatingClient {
    async fn send_heartbeat(&self, _id: &ClientId) -> Outcome {
        self.enter().await
    }

    async fn send_status_batch(&self, _ids: &[ClientId]) -> Outcome {
        self.enter().await
    }
}

/// Every call fails at the transport layer.
pub struct RefusingClient;

#[async_trait]
impl PresenceClient for RefusingClient {
    async fn send_heartbeat(&self, _id: &ClientId) -> Outcome {
        Outcome::transport("connection refused", Duration::from_millis(1))
    }

    async fn send_status_batch(&self, _ids: &[ClientId]) -> Outcome {
        Outcome::transport("connection refused", Duration::from_millis(1))
    }
}

/// Panics on every call.
pub struct PanickingClient;

#[async_trait]
impl PresenceClient for PanickingClient {
    async fn send_heartbeat(&self, _id: &ClientId) -> Outcome {
        panic!("heartbeat handler exploded")
    }

    async fn send_status_batch(&self, _ids: &[ClientId]) -> Outcome {
        panic!("status handler exploded")
    }
}

/// Probe answering from a function of the candidate size, without running load.
pub struct FnProbe<F> {
    respond: F,
    calls: Mutex<Vec<usize>>,
}

impl<F> FnProbe<F>
where
    F: Fn(usize, usize) -> RunMetrics + Send + Sync,
{
    /// `respond` receives the candidate and the 0-based call index.
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> CapacityProbe for FnProbe<F>
where
    F: Fn(usize, usize) -> RunMetrics + Send + Sync,
{
    async fn probe(&self, candidate: usize) -> CoreResult<RunMetrics> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(candidate);
            calls.len() - 1
        };
        Ok((self.respond)(candidate, index))
    }
}

/// Metrics for `total` operations, all succeeding at `latency`.
pub fn healthy_run(total: usize, latency: Duration) -> RunMetrics {
    aggregate(
        (0..total).map(|_| Outcome::success(latency)),
        Duration::from_secs(1),
    )
}

/// Metrics for `total` operations that all failed.
pub fn failed_run(total: usize) -> RunMetrics {
    aggregate(
        (0..total).map(|_| Outcome::protocol(503, "overloaded", Duration::from_millis(1))),
        Duration::from_secs(1),
    )
}
