//! Result of one synthetic operation.

use std::fmt;
use std::time::Duration;

/// Why a synthetic operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, DNS, timeout, or body read failure.
    Transport,

    /// The service answered with a non-OK status code.
    Protocol {
        /// HTTP status returned by the service.
        status: u16,
    },

    /// The worker executing the operation did not finish normally.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::Protocol { status } => write!(f, "protocol({status})"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Failed operation with its diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Time spent before the failure was observed.
    pub latency: Duration,
}

/// Outcome of one dispatched operation; consumed once by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { latency: Duration },
    Failure(Failure),
}

impl Outcome {
    #[must_use]
    pub fn success(latency: Duration) -> Self {
        Self::Success { latency }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>, latency: Duration) -> Self {
        Self::Failure(Failure {
            kind: FailureKind::Transport,
            message: message.into(),
            latency,
        })
    }

    #[must_use]
    pub fn protocol(status: u16, message: impl Into<String>, latency: Duration) -> Self {
        Self::Failure(Failure {
            kind: FailureKind::Protocol { status },
            message: message.into(),
            latency,
        })
    }

    #[must_use]
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Failure(Failure {
            kind: FailureKind::Aborted,
            message: message.into(),
            latency: Duration::ZERO,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Wall-clock latency, whether or not the operation succeeded.
    #[must_use]
    pub fn latency(&self) -> Duration {
        match self {
            Self::Success { latency } => *latency,
            Self::Failure(failure) => failure.latency,
        }
    }
}
