//! Relay Layer
//!
//! The Cloud-Connection-Server relay core: a long-lived, authenticated,
//! encrypted stream over which JSON envelopes flow in both directions,
//! with ack/nack correlation by message id and automatic reconnection.
//!
//! # Architecture
//!
//! - **Envelope/codec**: wire data model and JSON framing
//! - **Message id generator**: collision-resistant outbound ids
//! - **Correlation tracker**: pending-ack table, bounded by timeout
//! - **Transport trait**: injected encrypted-stream dependency
//! - **Relay connection**: lifecycle, send queue, backoff, dispatch
//! - **Message router**: classification and automatic acks
//!
//! # Example
//!
//! ```ignore
//! use cloudlink_core::relay::{
//!     Credentials, MessageRouter, MockTransport, RelayConfig, RelayConnection,
//! };
//!
//! let mut connection = RelayConnection::new(MockTransport::new(), RelayConfig::default());
//! let router = MessageRouter::new(connection.tracker(), upstream_handler);
//! connection.on_inbound(Box::new(router));
//!
//! connection.connect(Credentials::new("sender-id", "api-key"))?;
//! let msg_id = connection.send_data("device-token", payload)?;
//! connection.process_incoming()?;
//! ```

mod codec;
mod connection;
mod correlation;
mod envelope;
mod error;
mod message_id;
mod mock;
mod router;
mod transport;

#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
mod websocket;

// Error types
pub use error::{RelayError, RelayResult};

// Envelope types and codec
pub use codec::{
    decode_envelope, encode_envelope, read_frame_length, FRAME_HEADER_SIZE, MAX_MESSAGE_SIZE,
};
pub use envelope::{
    Envelope, EnvelopeKind, MessageId, MESSAGE_TYPE_ACK, MESSAGE_TYPE_CONTROL, MESSAGE_TYPE_NACK,
};

// Message id generation
pub use message_id::MessageIdGenerator;

// Correlation tracking
pub use correlation::{AckOutcome, CorrelationEntry, CorrelationTracker};

// Transport abstraction
pub use transport::{ConnectionState, Credentials, Transport, TransportConfig, TransportResult};

// Mock transport for testing
pub use mock::MockTransport;

// WebSocket transport for production
#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
pub use websocket::WebSocketTransport;

// Connection management
pub use connection::{
    BackoffConfig, InboundHandler, RelayConfig, RelayConnection, SendPolicy, SendStatus,
};

// Message routing
pub use router::{AckPolicy, DeliveryEvents, MessageRouter, UpstreamHandler};
