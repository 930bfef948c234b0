//! Core domain types and traits for the loadscout capacity search.

pub mod config;
pub mod criteria;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod mix;
pub mod outcome;
pub mod population;
pub mod traits;

pub use config::{
    LoadConfig, LoadscoutConfig, MixConfig, PopulationConfig, SearchConfig, TargetConfig,
};
pub use criteria::{PassCriteria, Verdict};
pub use error::{CoreError, CoreResult};
pub use ids::ClientId;
pub use metrics::{aggregate, MetricsCollector, RunMetrics};
pub use mix::{Operation, RequestMix};
pub use outcome::{Failure, FailureKind, Outcome};
pub use population::Population;
pub use traits::{CapacityProbe, PresenceClient};
