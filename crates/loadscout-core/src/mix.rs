//! Request mix policy: which operation each dispatch issues, and for whom.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ids::ClientId;

/// Default share of single-identity heartbeats.
pub const DEFAULT_HEARTBEAT_WEIGHT: f64 = 0.8;

/// Default number of identities in one status batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Synthetic operation chosen for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Report one client as alive.
    Heartbeat(ClientId),

    /// Look up last-seen times for a batch of clients.
    StatusBatch(Vec<ClientId>),
}

impl Operation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heartbeat(_) => "heartbeat",
            Self::StatusBatch(_) => "status",
        }
    }
}

/// Weighted choice between heartbeats and batch status checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestMix {
    /// Probability (0.0-1.0) that a dispatch is a heartbeat.
    pub heartbeat_weight: f64,

    /// Identities per status batch, sampled with replacement.
    pub batch_size: usize,
}

impl Default for RequestMix {
    fn default() -> Self {
        Self {
            heartbeat_weight: DEFAULT_HEARTBEAT_WEIGHT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RequestMix {
    /// Validate weight range and batch size.
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.heartbeat_weight) {
            return Err(CoreError::invalid_config(format!(
                "heartbeat weight {} must be within [0.0, 1.0]",
                self.heartbeat_weight
            )));
        }

        if self.batch_size == 0 {
            return Err(CoreError::invalid_config("status batch size must be > 0"));
        }

        Ok(())
    }

    /// Choose the operation for one dispatch.
    ///
    /// Targets are drawn uniformly from `ids`. Returns `None` only when `ids`
    /// is empty.
    pub fn select<R: Rng>(&self, ids: &[ClientId], rng: &mut R) -> Option<Operation> {
        if ids.is_empty() {
            return None;
        }

        if rng.gen_bool(self.heartbeat_weight.clamp(0.0, 1.0)) {
            ids.choose(rng).cloned().map(Operation::Heartbeat)
        } else {
            let batch = (0..self.batch_size)
                .filter_map(|_| ids.choose(rng).cloned())
                .collect();
            Some(Operation::StatusBatch(batch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Population;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_mix_ratio() {
        let population = Population::generate(100);
        let mix = RequestMix::default();
        let mut rng = StdRng::seed_from_u64(7);

        let mut heartbeats = 0;
        for _ in 0..10_000 {
            if let Some(Operation::Heartbeat(_)) = mix.select(population.as_slice(), &mut rng) {
                heartbeats += 1;
            }
        }

        // ~80% heartbeats, allow a wide margin
        assert!(heartbeats > 7_600 && heartbeats < 8_400, "heartbeats = {heartbeats}");
    }

    #[test]
    fn test_batch_size_and_membership() {
        let population = Population::generate(20);
        let mix = RequestMix {
            heartbeat_weight: 0.0,
            batch_size: 50,
        };
        let mut rng = StdRng::seed_from_u64(1);

        match mix.select(population.as_slice(), &mut rng) {
            Some(Operation::StatusBatch(batch)) => {
                assert_eq!(batch.len(), 50);
                assert!(batch.iter().all(|id| population.as_slice().contains(id)));
            }
            other => panic!("expected status batch, got {other:?}"),
        }
    }

    #[test]
    fn test_heartbeat_covers_population() {
        let population = Population::generate(10);
        let mix = RequestMix {
            heartbeat_weight: 1.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..1_000 {
            if let Some(Operation::Heartbeat(id)) = mix.select(population.as_slice(), &mut rng) {
                seen.insert(id);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_empty_population_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(RequestMix::default().select(&[], &mut rng).is_none());
    }

    #[test]
    fn test_validation() {
        assert!(RequestMix::default().validate().is_ok());

        let bad_weight = RequestMix {
            heartbeat_weight: 1.5,
            ..Default::default()
        };
        assert!(bad_weight.validate().is_err());

        let bad_batch = RequestMix {
            batch_size: 0,
            ..Default::default()
        };
        assert!(bad_batch.validate().is_err());
    }
}
