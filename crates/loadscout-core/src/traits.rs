use async_trait::async_trait;

use crate::error::CoreResult;
use crate::ids::ClientId;
use crate::metrics::RunMetrics;
use crate::outcome::Outcome;

/// Client for the presence service under test.
///
/// Implementations make exactly one attempt per call and report every
/// failure as an [`Outcome::Failure`]; they never panic or retry.
#[async_trait]
pub trait PresenceClient: Send + Sync {
    /// Reports one client as alive.
    async fn send_heartbeat(&self, id: &ClientId) -> Outcome;

    /// Requests last-seen times for a batch of clients.
    async fn send_status_batch(&self, ids: &[ClientId]) -> Outcome;
}

/// Executes one timed run at a candidate population size.
#[async_trait]
pub trait CapacityProbe: Send + Sync {
    /// Runs load for `candidate` simulated clients and returns its metrics.
    async fn probe(&self, candidate: usize) -> CoreResult<RunMetrics>;

    /// Largest candidate this probe can run, if bounded.
    fn max_candidate(&self) -> Option<usize> {
        None
    }
}
