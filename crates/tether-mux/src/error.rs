//! Error types for the multiplexer and its collaborators.

use tether_pty::SpawnError;

/// Errors returned by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A status store call failed. Always swallowed by the multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

/// A notification could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification failed: {0}")]
    Failed(String),
}

/// A viewer transport refused a frame.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("viewer connection closed")]
    Closed,

    #[error("viewer send failed: {0}")]
    Failed(String),
}
