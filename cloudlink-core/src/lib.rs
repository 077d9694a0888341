// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Cloudlink Core
//!
//! Client library for the Cloud-Connection-Server push relay. Maintains a
//! single long-lived, authenticated connection over which JSON envelopes
//! flow in both directions, correlates outbound messages with server
//! acks and nacks, reconnects with exponential backoff, and routes
//! inbound application messages to a caller-supplied handler with
//! automatic acking.
//!
//! ## Modules
//!
//! - [`relay`] - envelope codec, message ids, ack correlation, connection
//!   lifecycle and routing
//! - [`registry`] - SQLite row store for group and membership records

pub mod registry;
pub mod relay;

pub use registry::{GroupRow, MembershipRow, Registry, RegistryError};
pub use relay::{
    AckOutcome, AckPolicy, BackoffConfig, ConnectionState, CorrelationTracker, Credentials,
    DeliveryEvents, Envelope, EnvelopeKind, InboundHandler, MessageId, MessageIdGenerator,
    MessageRouter, MockTransport, RelayConfig, RelayConnection, RelayError, RelayResult,
    SendPolicy, SendStatus, Transport, TransportConfig, UpstreamHandler,
};

#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
pub use relay::WebSocketTransport;
