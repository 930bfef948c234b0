use thiserror::Error;

/// Canonical error type for loadscout operations.
///
/// Failures of individual synthetic operations are never reported through
/// this type; they are folded into [`crate::RunMetrics`] as
/// [`crate::Outcome::Failure`] values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Parameters are invalid and no run can start.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable description of the offending parameter.
        message: String,
    },

    /// Configuration sources could not be read or deserialized.
    #[error("configuration source error: {0}")]
    Config(#[from] config::ConfigError),

    /// The client handle for the system under test could not be built.
    #[error("client setup failed: {message}")]
    Client {
        /// Underlying setup failure.
        message: String,
    },

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },
}

impl CoreError {
    /// Creates an `InvalidConfig` variant.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a `Client` variant.
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for errors that reject parameters before any dispatch.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
