//! Load generation engine and capacity search controller.

pub mod engine;
pub mod pool;
pub mod probe;
pub mod search;

pub use engine::{LoadEngine, RunPlan};
pub use pool::{TaskError, WorkerPool};
pub use probe::{EngineProbe, LoadSettings};
pub use search::{
    max_iterations, CapacitySearch, SearchReport, SearchSettings, SearchState, SearchStep,
};
