use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the DankCord reply correlator.
///
/// Only faults live here. An in-game failure or a cooldown notice is a
/// normal `CommandResult`, never an error.
#[derive(Debug, Error)]
pub enum DankError {
    #[error("correlation token already registered: {0}")]
    DuplicateToken(String),

    #[error("correlation token not resolved: {0}")]
    NotResolved(String),

    #[error("timed out after {waited:?} waiting for token {token}")]
    Timeout { token: String, waited: Duration },

    #[error("malformed cooldown notice: {0}")]
    MalformedCooldown(String),

    #[error("{0} reply needs the traded item and quantity")]
    MissingTradeContext(String),

    #[error("unknown command family: {0}")]
    UnknownFamily(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DankError {
    /// Whether the caller may reasonably retry the command.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, DankError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DankError::Timeout {
            token: "42".into(),
            waited: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "timed out after 3s waiting for token 42");
        assert_eq!(
            DankError::MissingTradeContext("buy".into()).to_string(),
            "buy reply needs the traded item and quantity"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(DankError::Transport("closed".into()).is_retryable());
        assert!(!DankError::DuplicateToken("1".into()).is_retryable());
        assert!(!DankError::MalformedCooldown("x".into()).is_retryable());
    }
}
