//! Paced load generation engine

use std::sync::Arc;
use std::time::Duration;

use loadscout_core::{
    ClientId, CoreError, CoreResult, MetricsCollector, Operation, Outcome, Population,
    PresenceClient, RequestMix, RunMetrics,
};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::pool::WorkerPool;

/// Parameters of one timed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPlan {
    /// Dispatches per second
    pub target_rate: f64,

    /// Dispatch window; in-flight work is drained after it closes
    pub duration: Duration,

    /// Maximum operations executing against the service at once
    pub max_concurrency: usize,
}

impl RunPlan {
    /// Validate the plan before anything is dispatched.
    pub fn validate(&self) -> CoreResult<()> {
        self.dispatch_interval()?;

        if self.duration.is_zero() {
            return Err(CoreError::invalid_config("run duration must be > 0"));
        }

        if self.max_concurrency == 0 {
            return Err(CoreError::invalid_config("max concurrency must be > 0"));
        }

        Ok(())
    }

    /// Fixed inter-arrival interval, `1 / target_rate`.
    pub fn dispatch_interval(&self) -> CoreResult<Duration> {
        if !self.target_rate.is_finite() || self.target_rate <= 0.0 {
            return Err(CoreError::invalid_config(format!(
                "target rate must be a positive number, got {}",
                self.target_rate
            )));
        }

        match Duration::try_from_secs_f64(1.0 / self.target_rate) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(CoreError::invalid_config(format!(
                "target rate {} is too high to pace",
                self.target_rate
            ))),
        }
    }

    /// Upper bound on dispatches in the window, `ceil(rate * duration)`.
    pub fn expected_dispatches(&self) -> usize {
        (self.target_rate * self.duration.as_secs_f64()).ceil() as usize
    }
}

/// Issues synthetic traffic at a fixed cadence through a bounded worker pool.
///
/// The client handle is injected and shared by every unit of a run.
pub struct LoadEngine {
    client: Arc<dyn PresenceClient>,
    mix: RequestMix,
}

impl LoadEngine {
    /// Create an engine for `client` using the given request mix.
    pub fn new(client: Arc<dyn PresenceClient>, mix: RequestMix) -> CoreResult<Self> {
        mix.validate()?;
        Ok(Self { client, mix })
    }

    pub fn mix(&self) -> RequestMix {
        self.mix
    }

    /// Run load against the service for `plan.duration`.
    ///
    /// Dispatches one unit per tick until the window closes, then waits for
    /// every dispatched unit before aggregating. Each dispatched unit
    /// contributes exactly one outcome to the returned metrics, and
    /// `total_duration` includes the drain.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` for an invalid plan or an empty
    /// population; nothing is dispatched in that case.
    pub async fn run(&self, population: &Population, plan: &RunPlan) -> CoreResult<RunMetrics> {
        plan.validate()?;
        if population.is_empty() {
            return Err(CoreError::invalid_config("population must not be empty"));
        }
        let interval = plan.dispatch_interval()?;

        tracing::info!(
            population = population.len(),
            target_rate = plan.target_rate,
            duration_ms = plan.duration.as_millis() as u64,
            max_concurrency = plan.max_concurrency,
            expected_dispatches = plan.expected_dispatches(),
            "Starting load run"
        );

        let ids: Arc<[ClientId]> = Arc::from(population.as_slice());
        let mut pool = WorkerPool::new(plan.max_concurrency);
        // The interval is truncated to whole nanoseconds, so the tick at
        // `rate * duration` can land just inside the window.
        let max_dispatches = plan.expected_dispatches();

        let start = Instant::now();
        let deadline = start + plan.duration;
        let mut ticker = interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        while pool.submitted() < max_dispatches {
            let scheduled = ticker.tick().await;
            if scheduled >= deadline {
                break;
            }

            let client = Arc::clone(&self.client);
            let ids = Arc::clone(&ids);
            let mix = self.mix;
            pool.submit(async move { execute(client.as_ref(), &ids, mix).await });
        }

        tracing::debug!(
            dispatched = pool.submitted(),
            in_flight = pool.pending(),
            "Dispatch window closed, draining"
        );

        let results = pool.drain().await;
        let elapsed = start.elapsed();

        let mut collector = MetricsCollector::with_capacity(results.len());
        for result in results {
            collector.record(result.unwrap_or_else(|e| Outcome::aborted(e.to_string())));
        }
        let metrics = collector.finish(elapsed);

        tracing::info!(
            total = metrics.total_requests,
            failed = metrics.failed_calls,
            avg_latency_ms = metrics.average_latency.as_secs_f64() * 1000.0,
            requests_per_sec = metrics.requests_per_sec,
            elapsed_ms = elapsed.as_millis() as u64,
            "Load run complete"
        );

        Ok(metrics)
    }
}

/// One unit of work: pick an operation, send it, report the outcome.
async fn execute(client: &dyn PresenceClient, ids: &[ClientId], mix: RequestMix) -> Outcome {
    let operation = mix.select(ids, &mut rand::thread_rng());

    match operation {
        Some(Operation::Heartbeat(id)) => client.send_heartbeat(&id).await,
        Some(Operation::StatusBatch(batch)) => client.send_status_batch(&batch).await,
        None => Outcome::aborted("no client identities to target"),
    }
}
