//! Error types for the TapFit session core

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors produced by a `PuckTransport` implementation
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No peripheral advertising the Puck service found within {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    #[error("Failed to connect to peripheral: {0}")]
    ConnectFailed(String),

    #[error("BLE adapter not available: {0}")]
    AdapterUnavailable(String),

    #[error("Service discovery failed: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Not connected to a peripheral")]
    NotConnected,
}

/// Session-terminal failures surfaced to the consumer.
///
/// The consumer never sees raw [`TransportError`] values; every
/// disconnect-class failure is either invisible (the supervisor is
/// retrying) or collapses into one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionError {
    #[error("Timed out searching for the Puck")]
    ConnectTimeout,

    #[error("Could not connect to the Puck: {reason}")]
    ConnectFailed { reason: String },

    #[error("Lost connection to the Puck and could not reconnect")]
    ReconnectExhausted,
}

impl From<&TransportError> for SessionError {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::ConnectTimeout { .. } => SessionError::ConnectTimeout,
            other => SessionError::ConnectFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Errors from the set persistence collaborator
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Failed to record completed set: {0}")]
    WriteFailed(String),
}

/// Umbrella error for the TapFit session core
#[derive(Error, Debug)]
pub enum TapfitError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Session task is no longer running")]
    SessionTaskStopped,
}

/// Result alias used throughout the workspace
pub type Result<T> = core::result::Result<T, TapfitError>;
