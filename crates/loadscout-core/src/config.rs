//! Configuration management for loadscout
//!
//! Values are layered, lowest priority first:
//! 1. Hardcoded defaults
//! 2. ./config/loadscout.{yaml,toml,json}
//! 3. Config file named by the LOADSCOUT_CONFIG env var
//! 4. Environment variables, e.g. `LOADSCOUT__SEARCH__ERROR_THRESHOLD=0.05`
//!
//! Command-line flags are applied on top by the CLI.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::criteria::PassCriteria;
use crate::error::{CoreError, CoreResult};
use crate::mix::RequestMix;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoadscoutConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub population: PopulationConfig,

    #[serde(default)]
    pub load: LoadConfig,

    #[serde(default)]
    pub mix: MixConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl LoadscoutConfig {
    /// Load configuration from defaults, files and environment, then validate.
    pub fn load() -> CoreResult<Self> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`LoadscoutConfig::load`] without validation, for
    /// callers that apply further overrides first.
    pub fn load_unvalidated() -> CoreResult<Self> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        builder = builder.add_source(File::with_name("./config/loadscout").required(false));

        if let Ok(config_path) = std::env::var("LOADSCOUT_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("LOADSCOUT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: LoadscoutConfig = builder.build()?.try_deserialize()?;

        tracing::debug!(
            target_url = %config.target.url,
            population = config.population.size,
            min_candidate = config.search.min_candidate,
            max_candidate = config.max_candidate(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Load configuration from a specific file path, on top of defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let config = Self::from_file_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// [`LoadscoutConfig::from_file`] without validation.
    pub fn from_file_unvalidated<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        Ok(Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> CoreResult<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(builder
            .set_default("target.url", "http://localhost:8080")?
            .set_default("target.request_timeout_ms", 5000)?
            .set_default("population.size", 10000)?
            .set_default("load.run_duration_ms", 5000)?
            .set_default("load.max_concurrency", 1000)?
            .set_default("load.ops_per_client_per_sec", 1.0)?
            .set_default("mix.heartbeat_weight", 0.8)?
            .set_default("mix.batch_size", 50)?
            .set_default("search.min_candidate", 100)?
            .set_default("search.error_threshold", 0.01)?
            .set_default("search.latency_threshold_ms", 100)?
            .set_default("search.confirm_runs", 1)?
            .set_default("search.cooldown_ms", 0)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> CoreResult<()> {
        if self.target.url.trim().is_empty() {
            return Err(CoreError::invalid_config("target.url must not be empty"));
        }

        if self.target.request_timeout_ms == 0 {
            return Err(CoreError::invalid_config(
                "target.request_timeout_ms must be > 0",
            ));
        }

        if self.population.size == 0 {
            return Err(CoreError::invalid_config("population.size must be > 0"));
        }

        if self.load.run_duration_ms == 0 {
            return Err(CoreError::invalid_config("load.run_duration_ms must be > 0"));
        }

        if self.load.max_concurrency == 0 {
            return Err(CoreError::invalid_config("load.max_concurrency must be > 0"));
        }

        if !self.load.ops_per_client_per_sec.is_finite() || self.load.ops_per_client_per_sec <= 0.0
        {
            return Err(CoreError::invalid_config(
                "load.ops_per_client_per_sec must be > 0",
            ));
        }

        self.mix.request_mix().validate()?;
        self.search.criteria().validate()?;

        if self.search.min_candidate == 0 {
            return Err(CoreError::invalid_config("search.min_candidate must be > 0"));
        }

        let max_candidate = self.max_candidate();
        if self.search.min_candidate > max_candidate {
            return Err(CoreError::invalid_config(format!(
                "search.min_candidate ({}) must be <= max candidate ({})",
                self.search.min_candidate, max_candidate
            )));
        }

        if max_candidate > self.population.size {
            return Err(CoreError::invalid_config(format!(
                "search.max_candidate ({}) must be <= population.size ({})",
                max_candidate, self.population.size
            )));
        }

        Ok(())
    }

    /// Upper search bound; the full population unless configured otherwise
    pub fn max_candidate(&self) -> usize {
        self.search.max_candidate.unwrap_or(self.population.size)
    }
}

/// System under test
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Base URL of the presence service
    pub url: String,

    /// Per-call timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl TargetConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Synthetic population
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PopulationConfig {
    /// Number of identities generated for the whole search
    pub size: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self { size: 10_000 }
    }
}

/// Timed run parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadConfig {
    /// Dispatch window of one run in milliseconds
    pub run_duration_ms: u64,

    /// Maximum operations in flight against the service
    pub max_concurrency: usize,

    /// Operations each simulated client issues per second
    pub ops_per_client_per_sec: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            run_duration_ms: 5000,
            max_concurrency: 1000,
            ops_per_client_per_sec: 1.0,
        }
    }
}

impl LoadConfig {
    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }
}

/// Request mix
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MixConfig {
    /// Share of heartbeats (0.0-1.0); the rest are status batches
    pub heartbeat_weight: f64,

    /// Identities per status batch
    pub batch_size: usize,
}

impl Default for MixConfig {
    fn default() -> Self {
        let mix = RequestMix::default();
        Self {
            heartbeat_weight: mix.heartbeat_weight,
            batch_size: mix.batch_size,
        }
    }
}

impl MixConfig {
    pub fn request_mix(&self) -> RequestMix {
        RequestMix {
            heartbeat_weight: self.heartbeat_weight,
            batch_size: self.batch_size,
        }
    }
}

/// Capacity search
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Lowest candidate, assumed to pass
    pub min_candidate: usize,

    /// Highest candidate; defaults to the population size
    #[serde(default)]
    pub max_candidate: Option<usize>,

    /// Maximum tolerated error rate (0.0-1.0)
    pub error_threshold: f64,

    /// Maximum tolerated average latency in milliseconds
    pub latency_threshold_ms: u64,

    /// Re-runs of the converged value used to detect non-monotonic targets
    pub confirm_runs: usize,

    /// Pause between consecutive runs in milliseconds
    pub cooldown_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_candidate: 100,
            max_candidate: None,
            error_threshold: 0.01,
            latency_threshold_ms: 100,
            confirm_runs: 1,
            cooldown_ms: 0,
        }
    }
}

impl SearchConfig {
    pub fn criteria(&self) -> PassCriteria {
        PassCriteria {
            max_error_rate: self.error_threshold,
            max_average_latency: Duration::from_millis(self.latency_threshold_ms),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}
