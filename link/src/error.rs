//! Error types for kalam-notify.

use thiserror::Error;

/// Errors that can occur while building or running a notification stream.
///
/// Transport failures (refused connections, dropped sockets, keepalive
/// timeouts) are handled by the connection task and its reconnect policy;
/// they reach consumers through [`EventHandlers`](crate::EventHandlers), not
/// as `Err` values from the public API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The subscription was explicitly disconnected and cannot be reused.
    #[error("Subscription has been disconnected")]
    Disconnected,

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type for kalam-notify operations
pub type Result<T> = std::result::Result<T, NotifyError>;

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::DecodeError(err.to_string())
    }
}
