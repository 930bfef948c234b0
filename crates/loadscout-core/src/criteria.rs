//! Pass/fail thresholds applied to a run.

use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::metrics::RunMetrics;

/// Thresholds a run must meet for its candidate size to pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassCriteria {
    /// Maximum error rate (0.0-1.0)
    pub max_error_rate: f64,

    /// Maximum average latency over successful calls
    pub max_average_latency: Duration,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            max_error_rate: 0.01, // 1%
            max_average_latency: Duration::from_millis(100),
        }
    }
}

/// Result of evaluating one run against [`PassCriteria`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Threshold violations; empty when the run passed
    pub failures: Vec<String>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get failure summary
    pub fn summary(&self) -> String {
        if self.failures.is_empty() {
            return "all criteria passed".to_string();
        }
        self.failures.join("; ")
    }
}

impl PassCriteria {
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.max_error_rate) {
            return Err(CoreError::invalid_config(format!(
                "error threshold {} must be within [0.0, 1.0]",
                self.max_error_rate
            )));
        }
        Ok(())
    }

    /// Check a run against the thresholds.
    ///
    /// A run that recorded no operations never passes.
    pub fn evaluate(&self, metrics: &RunMetrics) -> Verdict {
        let mut failures = Vec::new();

        if metrics.total_requests == 0 {
            failures.push("no operations were recorded".to_string());
            return Verdict { failures };
        }

        let error_rate = metrics.error_rate();
        if error_rate > self.max_error_rate {
            failures.push(format!(
                "error rate {:.2}% exceeds target {:.2}%",
                error_rate * 100.0,
                self.max_error_rate * 100.0
            ));
        }

        if metrics.average_latency > self.max_average_latency {
            failures.push(format!(
                "average latency {:.2}ms exceeds target {:.2}ms",
                metrics.average_latency.as_secs_f64() * 1000.0,
                self.max_average_latency.as_secs_f64() * 1000.0
            ));
        }

        Verdict { failures }
    }
}
