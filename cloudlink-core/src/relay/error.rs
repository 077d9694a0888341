//! Relay error types.

use thiserror::Error;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Relay error types.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Inbound payload is not a well-formed wire frame or JSON object.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope is well-formed but missing fields required for its type.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Not connected")]
    NotConnected,

    /// The connection was closed by the peer or the transport broke.
    #[error("Connection closed")]
    ConnectionClosed,

    /// `close()` was called; the connection is terminally closed.
    #[error("Connection is closed")]
    Closed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A message id was tracked twice. Indicates a generator or caller bug.
    #[error("Duplicate message id: {0}")]
    DuplicateId(String),

    #[error("Maximum reconnection attempts exceeded")]
    MaxRetriesExceeded,
}
