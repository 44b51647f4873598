use crate::state::ExchangeState;
use thiserror::Error;

/// Error types covering argument parsing, configuration, channel setup, and
/// the measurement loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatencyError {
    /// Malformed operator input (address, offset, size).
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Listen, accept, or connect failed.
    #[error("channel establishment failed: {0}")]
    Channel(String),

    /// A read or write inside the measurement loop failed or came up short.
    ///
    /// Any collected samples are discarded when this is raised.
    #[error("protocol failure at iteration {iteration} ({state}): {reason}")]
    Protocol {
        /// Zero-based iteration that failed.
        iteration: usize,
        /// Exchange state the failure occurred in.
        state: ExchangeState,
        /// What went wrong.
        reason: String,
    },
}

impl LatencyError {
    /// Returns true if this error was raised inside the measurement loop.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

/// Convenience type alias for latency operations.
pub type LatencyResult<T> = Result<T, LatencyError>;
