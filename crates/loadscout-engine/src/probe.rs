use std::time::Duration;

use async_trait::async_trait;
use loadscout_core::{CapacityProbe, CoreError, CoreResult, Population, RunMetrics};

use crate::engine::{LoadEngine, RunPlan};

/// How a candidate population size is turned into a timed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSettings {
    pub run_duration: Duration,
    pub max_concurrency: usize,
    /// Operations each live client issues per second
    pub ops_per_client_per_sec: f64,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            run_duration: Duration::from_secs(5),
            max_concurrency: 1000,
            ops_per_client_per_sec: 1.0,
        }
    }
}

/// [`CapacityProbe`] backed by the load engine.
///
/// A candidate of `n` runs the first `n` identities of the population at
/// `n * ops_per_client_per_sec` dispatches per second.
pub struct EngineProbe {
    engine: LoadEngine,
    population: Population,
    settings: LoadSettings,
}

impl EngineProbe {
    pub fn new(engine: LoadEngine, population: Population, settings: LoadSettings) -> Self {
        Self {
            engine,
            population,
            settings,
        }
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Run plan for a candidate size.
    pub fn plan_for(&self, candidate: usize) -> RunPlan {
        RunPlan {
            target_rate: candidate as f64 * self.settings.ops_per_client_per_sec,
            duration: self.settings.run_duration,
            max_concurrency: self.settings.max_concurrency,
        }
    }
}

#[async_trait]
impl CapacityProbe for EngineProbe {
    async fn probe(&self, candidate: usize) -> CoreResult<RunMetrics> {
        if candidate == 0 {
            return Err(CoreError::invalid_config("candidate population must be > 0"));
        }
        let population = self.population.prefix(candidate)?;
        self.engine.run(&population, &self.plan_for(candidate)).await
    }

    fn max_candidate(&self) -> Option<usize> {
        Some(self.population.len())
    }
}
