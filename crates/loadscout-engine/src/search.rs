//! Binary search for the largest population that meets the pass criteria
//!
//! The search assumes pass/fail is monotonic in population size: if `n`
//! passes, every smaller size passes, and if `n` fails, every larger size
//! fails. Nothing during the search checks this. Confirmation runs
//! ([`SearchSettings::confirm_runs`]) re-probe the converged value and flag
//! the report when it no longer passes, which is the visible symptom of a
//! target whose behaviour drifts between runs.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use loadscout_core::{CapacityProbe, CoreError, CoreResult, PassCriteria, RunMetrics, Verdict};
use uuid::Uuid;

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SearchSettings {
    pub criteria: PassCriteria,

    /// Re-runs of the converged value; 0 disables confirmation
    pub confirm_runs: usize,

    /// Pause before every probe after the first
    pub cooldown: Duration,
}

/// Bounds on the passing population size.
///
/// `low` is known (or assumed) to pass; sizes above `high` are known to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    pub low: usize,
    pub high: usize,
}

impl SearchState {
    /// Initial bounds `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` when `min` is zero or above `max`.
    pub fn new(min: usize, max: usize) -> CoreResult<Self> {
        if min == 0 {
            return Err(CoreError::invalid_config("minimum candidate must be > 0"));
        }
        if min > max {
            return Err(CoreError::invalid_config(format!(
                "search bounds are inverted: min {min} > max {max}"
            )));
        }
        Ok(Self { low: min, high: max })
    }

    pub fn is_converged(&self) -> bool {
        self.low >= self.high
    }

    /// Next candidate, `ceil((low + high) / 2)`.
    pub fn candidate(&self) -> usize {
        self.low + (self.high - self.low + 1) / 2
    }

    /// Narrow the bounds with the verdict for `candidate`.
    pub fn record(&mut self, candidate: usize, passed: bool) {
        if passed {
            self.low = candidate;
        } else {
            self.high = candidate - 1;
        }
    }
}

/// One probe made by the controller.
#[derive(Debug, Clone)]
pub struct SearchStep {
    /// 1-based iteration; confirmation runs continue the numbering
    pub iteration: usize,
    pub candidate: usize,
    /// Bounds before this step
    pub bounds: SearchState,
    pub metrics: RunMetrics,
    pub verdict: Verdict,
}

/// Full record of a capacity search.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub min_candidate: usize,
    pub max_candidate: usize,
    pub criteria: PassCriteria,
    /// Largest population that passed
    pub max_population: usize,
    pub steps: Vec<SearchStep>,
    pub confirmations: Vec<SearchStep>,
    /// `None` when confirmation was disabled
    pub confirmed: Option<bool>,
    pub elapsed: Duration,
}

impl SearchReport {
    /// Number of binary search iterations, excluding confirmation runs
    pub fn iterations(&self) -> usize {
        self.steps.len()
    }
}

/// Upper bound on iterations for `[min, max]`: `ceil(log2(max - min + 1))`.
pub fn max_iterations(min: usize, max: usize) -> usize {
    if max <= min {
        return 0;
    }
    let span = max - min; // size - 1
    (usize::BITS - span.leading_zeros()) as usize
}

/// Drives repeated probes to find the maximum passing population.
///
/// Probes run strictly one after another; the search state has a single owner.
pub struct CapacitySearch<P> {
    probe: P,
    settings: SearchSettings,
}

impl<P: CapacityProbe> CapacitySearch<P> {
    pub fn new(probe: P, settings: SearchSettings) -> Self {
        Self { probe, settings }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Largest population in `[min, max]` that passes.
    pub async fn find_max_population(&self, min: usize, max: usize) -> CoreResult<usize> {
        Ok(self.search(min, max).await?.max_population)
    }

    /// Run the search and return every step taken.
    ///
    /// # Errors
    ///
    /// Invalid bounds (including a `max` above [`CapacityProbe::max_candidate`])
    /// or criteria are rejected before the first probe. Errors
    /// from the probe itself abort the search.
    pub async fn search(&self, min: usize, max: usize) -> CoreResult<SearchReport> {
        let mut state = SearchState::new(min, max)?;
        if let Some(limit) = self.probe.max_candidate() {
            if max > limit {
                return Err(CoreError::invalid_config(format!(
                    "maximum candidate {max} exceeds the {limit} clients available to the probe"
                )));
            }
        }
        self.settings.criteria.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        tracing::info!(
            %run_id,
            min,
            max,
            max_iterations = max_iterations(min, max),
            max_error_rate = self.settings.criteria.max_error_rate,
            max_avg_latency_ms = self.settings.criteria.max_average_latency.as_millis() as u64,
            "Starting capacity search"
        );

        let mut steps = Vec::new();
        while !state.is_converged() {
            let candidate = state.candidate();
            let bounds = state;
            let step = self.probe_step(steps.len() + 1, candidate, bounds).await?;

            state.record(candidate, step.verdict.passed());
            tracing::info!(
                %run_id,
                iteration = step.iteration,
                candidate,
                passed = step.verdict.passed(),
                low = state.low,
                high = state.high,
                "Search step complete"
            );
            steps.push(step);
        }

        let max_population = state.low;
        let mut confirmations = Vec::new();
        for _ in 0..self.settings.confirm_runs {
            let iteration = steps.len() + confirmations.len() + 1;
            let step = self.probe_step(iteration, max_population, state).await?;
            if !step.verdict.passed() {
                tracing::warn!(
                    %run_id,
                    candidate = max_population,
                    reason = %step.verdict.summary(),
                    "Converged population failed confirmation; target may not behave monotonically"
                );
            }
            confirmations.push(step);
        }

        let confirmed = if confirmations.is_empty() {
            None
        } else {
            Some(confirmations.iter().all(|step| step.verdict.passed()))
        };

        let elapsed = clock.elapsed();
        tracing::info!(
            %run_id,
            max_population,
            iterations = steps.len(),
            confirmed = ?confirmed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Capacity search complete"
        );

        Ok(SearchReport {
            run_id,
            started_at,
            min_candidate: min,
            max_candidate: max,
            criteria: self.settings.criteria,
            max_population,
            steps,
            confirmations,
            confirmed,
            elapsed,
        })
    }

    async fn probe_step(
        &self,
        iteration: usize,
        candidate: usize,
        bounds: SearchState,
    ) -> CoreResult<SearchStep> {
        if iteration > 1 && !self.settings.cooldown.is_zero() {
            tokio::time::sleep(self.settings.cooldown).await;
        }

        let metrics = self.probe.probe(candidate).await?;
        let verdict = self.settings.criteria.evaluate(&metrics);

        if !verdict.passed() {
            tracing::debug!(candidate, reason = %verdict.summary(), "Candidate failed");
        }

        Ok(SearchStep {
            iteration,
            candidate,
            bounds,
            metrics,
            verdict,
        })
    }
}
