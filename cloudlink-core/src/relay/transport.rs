//! Transport Trait
//!
//! Platform-agnostic abstraction over the encrypted, ordered, reliable
//! stream the relay connection runs on. The transport moves opaque
//! frames; envelope encoding/decoding lives in the codec.

use super::error::RelayError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, RelayError>;

/// Relay connection state, owned by `RelayConnection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to any server.
    Disconnected,
    /// Transport connection in progress.
    Connecting,
    /// Transport established, credential exchange in progress.
    Authenticating,
    /// Connected and authenticated.
    Connected,
    /// Connection lost, a reconnect attempt is scheduled.
    Reconnecting { attempt: u32 },
    /// Terminally closed; all further operations fail.
    Closed,
}

/// Credentials supplied by the application for the relay login.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Sender identity (e.g. the server-side sender id).
    pub identity: String,
    /// Shared secret / API key.
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: &str, secret: &str) -> Self {
        Credentials {
            identity: identity.to_string(),
            secret: secret.to_string(),
        }
    }
}

/// Configuration for transport connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Server URL/address.
    pub server_url: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds.
    pub io_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            server_url: String::new(),
            connect_timeout_ms: 10_000,
            io_timeout_ms: 30_000,
        }
    }
}

/// Transport trait for relay communication.
///
/// Implementations expose a blocking interface; the connection drives
/// them from its read loop. Transport security (TLS) is entirely the
/// implementation's concern.
pub trait Transport: Send {
    /// Establishes the stream connection.
    fn connect(&mut self, config: &TransportConfig) -> TransportResult<()>;

    /// Performs the credential exchange on an established stream.
    fn authenticate(&mut self, credentials: &Credentials) -> TransportResult<()>;

    /// Tears down the stream. Safe to call when not connected.
    fn disconnect(&mut self) -> TransportResult<()>;

    /// Returns true while the stream is usable.
    fn is_connected(&self) -> bool;

    /// Writes one frame. Blocking, subject to the configured io timeout.
    fn send_frame(&mut self, frame: &[u8]) -> TransportResult<()>;

    /// Reads the next frame. `Ok(None)` means no frame is available
    /// within the io timeout; that is not an error.
    fn receive_frame(&mut self) -> TransportResult<Option<Vec<u8>>>;

    /// Checks if frames are waiting to be received (non-blocking).
    fn has_pending(&self) -> bool;
}
