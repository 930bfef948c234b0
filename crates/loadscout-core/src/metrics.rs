//! Metrics aggregation for one timed run

use std::time::Duration;

use crate::outcome::{FailureKind, Outcome};

/// Number of failure diagnostics retained per run.
pub const MAX_SAMPLE_ERRORS: usize = 10;

/// Aggregate of one timed run.
///
/// Built once by [`MetricsCollector::finish`] after every dispatched
/// operation has reported, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    /// Operations that reported an outcome
    pub total_requests: usize,

    pub successful_calls: usize,

    pub failed_calls: usize,

    /// Breakdown of `failed_calls` by kind
    pub transport_failures: usize,
    pub protocol_failures: usize,
    pub aborted_calls: usize,

    /// Wall time of the run including the drain of in-flight work
    pub total_duration: Duration,

    /// Latency statistics over successful calls; all zero without successes
    pub min_latency: Duration,
    pub average_latency: Duration,
    pub max_latency: Duration,
    pub p50_latency: Duration,
    pub p95_latency: Duration,
    pub p99_latency: Duration,

    /// Total operations per second of wall time
    pub requests_per_sec: f64,

    /// First few failure diagnostics, for debugging
    pub sample_errors: Vec<String>,
}

impl RunMetrics {
    /// Calculate error rate (0.0-1.0)
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_calls as f64 / self.total_requests as f64
    }

    /// Whether any operation succeeded, i.e. latency statistics are defined.
    pub fn has_latency(&self) -> bool {
        self.successful_calls > 0
    }
}

/// Consumes outcomes of one run and reduces them to [`RunMetrics`].
///
/// Order of `record` calls does not matter.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    successful: usize,
    transport: usize,
    protocol: usize,
    aborted: usize,
    latency_total: Duration,
    min_latency: Option<Duration>,
    max_latency: Duration,
    latencies_us: Vec<u64>,
    sample_errors: Vec<String>,
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector sized for an expected number of outcomes
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            latencies_us: Vec::with_capacity(expected),
            ..Self::default()
        }
    }

    /// Record one outcome
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success { latency } => {
                self.successful += 1;
                self.latency_total += latency;
                self.min_latency = Some(self.min_latency.map_or(latency, |min| min.min(latency)));
                self.max_latency = self.max_latency.max(latency);
                self.latencies_us
                    .push(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
            }
            Outcome::Failure(failure) => {
                match failure.kind {
                    FailureKind::Transport => self.transport += 1,
                    FailureKind::Protocol { .. } => self.protocol += 1,
                    FailureKind::Aborted => self.aborted += 1,
                }
                if self.sample_errors.len() < MAX_SAMPLE_ERRORS {
                    self.sample_errors
                        .push(format!("{}: {}", failure.kind, failure.message));
                }
            }
        }
    }

    /// Number of outcomes recorded so far
    pub fn recorded(&self) -> usize {
        self.successful + self.transport + self.protocol + self.aborted
    }

    /// Finalize into metrics for a run that took `elapsed` wall time
    pub fn finish(mut self, elapsed: Duration) -> RunMetrics {
        let failed = self.transport + self.protocol + self.aborted;
        let total = self.successful + failed;

        let requests_per_sec = if elapsed.is_zero() {
            0.0
        } else {
            total as f64 / elapsed.as_secs_f64()
        };

        let mut metrics = RunMetrics {
            total_requests: total,
            successful_calls: self.successful,
            failed_calls: failed,
            transport_failures: self.transport,
            protocol_failures: self.protocol,
            aborted_calls: self.aborted,
            total_duration: elapsed,
            requests_per_sec,
            sample_errors: self.sample_errors,
            ..RunMetrics::default()
        };

        if self.successful == 0 {
            return metrics;
        }

        self.latencies_us.sort_unstable();
        let sorted = &self.latencies_us;

        metrics.min_latency = self.min_latency.unwrap_or_default();
        metrics.max_latency = self.max_latency;
        metrics.average_latency = average(self.latency_total, self.successful);
        metrics.p50_latency = percentile(sorted, 0.50);
        metrics.p95_latency = percentile(sorted, 0.95);
        metrics.p99_latency = percentile(sorted, 0.99);

        metrics
    }
}

/// Reduce a closed collection of outcomes into run metrics.
pub fn aggregate<I>(outcomes: I, elapsed: Duration) -> RunMetrics
where
    I: IntoIterator<Item = Outcome>,
{
    let mut collector = MetricsCollector::new();
    for outcome in outcomes {
        collector.record(outcome);
    }
    collector.finish(elapsed)
}

fn average(total: Duration, count: usize) -> Duration {
    let nanos = total.as_nanos() / count as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn percentile(sorted_us: &[u64], p: f64) -> Duration {
    let index = ((sorted_us.len() as f64) * p) as usize;
    let index = index.min(sorted_us.len() - 1);
    Duration::from_micros(sorted_us[index])
}
