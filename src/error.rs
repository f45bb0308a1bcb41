//! Error types.
//!
//! All failures in `libstor` are represented by the [`StorError`] enum,
//! which derives [`thiserror::Error`] for ergonomic error handling and also
//! implements [`Serialize`]/[`Deserialize`] so errors can travel back to
//! clients over the transport layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for storage operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum StorError {
    /// The configuration file does not exist.
    #[error("configuration not found: {0}")]
    ConfigNotFound(String),

    /// The configuration file exists but cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The handle is unknown or its session was already closed.
    #[error("invalid handle {0}")]
    InvalidHandle(u64),

    /// No driver is registered under the requested name.
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    /// The query named a service the driver does not serve.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The storage backend failed; the message is forwarded verbatim.
    #[error("{0}")]
    Driver(String),

    /// A QUIC / transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server closed the connection while the operation was in flight.
    #[error("connection closed")]
    ConnectionClosed,

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorError {
    /// Create a [`StorError::Driver`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn driver<E: std::fmt::Display>(e: E) -> Self {
        Self::Driver(e.to_string())
    }

    /// Create a [`StorError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    /// Create a [`StorError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            StorError::InvalidHandle(42).to_string(),
            "invalid handle 42"
        );
        assert_eq!(
            StorError::ConfigNotFound("missing.json".into()).to_string(),
            "configuration not found: missing.json"
        );
        // backend messages pass through untouched
        assert_eq!(
            StorError::Driver("iscsi target unreachable".into()).to_string(),
            "iscsi target unreachable"
        );
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = StorError::UnknownDriver("tape".into());
        let json = serde_json::to_string(&err).expect("serialize");
        let de: StorError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de, err);
    }
}
