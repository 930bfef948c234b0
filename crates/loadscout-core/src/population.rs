//! Synthetic client population.

use crate::error::{CoreError, CoreResult};
use crate::ids::ClientId;

/// Fixed, ordered universe of synthetic clients for one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Population {
    ids: Vec<ClientId>,
}

impl Population {
    /// Generates `count` unique identities `user1..user{count}`.
    ///
    /// Deterministic: the same count always yields the same sequence.
    #[must_use]
    pub fn generate(count: usize) -> Self {
        let ids = (1..=count).map(ClientId::positional).collect();
        Self { ids }
    }

    /// Returns the first `count` identities as a new population.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` when `count` exceeds the population size.
    pub fn prefix(&self, count: usize) -> CoreResult<Self> {
        if count > self.ids.len() {
            return Err(CoreError::invalid_config(format!(
                "candidate population {count} exceeds generated population {}",
                self.ids.len()
            )));
        }
        Ok(Self {
            ids: self.ids[..count].to_vec(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ClientId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientId> {
        self.ids.iter()
    }
}

impl From<Vec<ClientId>> for Population {
    fn from(ids: Vec<ClientId>) -> Self {
        Self { ids }
    }
}
