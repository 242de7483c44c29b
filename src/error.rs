//! Error types for the trading engines.

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine and gateway operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Price or balance read failed; the tick is a no-op and is retried
    /// by the driver on the next interval.
    #[error("market unavailable: {0}")]
    MarketUnavailable(String),

    /// An execution call was rejected or failed in flight. Remaining
    /// decision steps of the current tick are skipped.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Out-of-range parameter at initialization. Fatal: the engine must
    /// not start.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// True when the error aborts a tick but leaves the engine runnable.
    pub fn is_transient(&self) -> bool {
        !matches!(self, EngineError::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(EngineError::MarketUnavailable("timeout".into()).is_transient());
        assert!(EngineError::OrderRejected("insufficient margin".into()).is_transient());
        assert!(!EngineError::InvalidConfig("bad parameter".into()).is_transient());
    }
}
