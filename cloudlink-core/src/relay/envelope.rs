// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Envelope Types
//!
//! The JSON message envelope exchanged with the Cloud-Connection-Server.
//! Every field is optional on the wire; which fields must be present
//! depends on the envelope's type and is checked at decode time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique message identifier for acknowledgment correlation.
pub type MessageId = String;

/// `message_type` value for positive acknowledgments.
pub const MESSAGE_TYPE_ACK: &str = "ack";
/// `message_type` value for negative acknowledgments.
pub const MESSAGE_TYPE_NACK: &str = "nack";
/// `message_type` value for server control advisories.
pub const MESSAGE_TYPE_CONTROL: &str = "control";

/// Envelope wrapping all traffic on the relay connection.
///
/// A data message has no `message_type`; acks and nacks carry
/// `"ack"`/`"nack"`. Absent optional fields are omitted on encode and
/// unknown fields are ignored on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Destination address (registration token), required on outbound data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Origin address, present on inbound data and on acks/nacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Unique message id, required on data/ack/nack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Discriminant: absent = data message, "ack", "nack", "control", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Source application package of an upstream data message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Application payload of a data message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    /// Coalescing hint: pending messages with the same key collapse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    /// Server-side retention in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u64>,
    /// Hold delivery while the device is idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_while_idle: Option<bool>,
}

/// Envelope classification, decided once at decode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Application data message (no `message_type`).
    Data,
    /// Positive acknowledgment.
    Ack,
    /// Negative acknowledgment.
    Nack,
    /// Server control advisory (e.g. connection draining).
    Control,
    /// Unrecognized `message_type` value, kept for forward compatibility.
    Unknown(String),
}

impl Envelope {
    /// Creates an outbound data message envelope.
    pub fn data_message(to: &str, message_id: &str, data: BTreeMap<String, String>) -> Self {
        Envelope {
            to: Some(to.to_string()),
            message_id: Some(message_id.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    /// Creates an ack envelope for an upstream message received from `from`.
    pub fn ack(to: &str, message_id: &str) -> Self {
        Envelope {
            to: Some(to.to_string()),
            message_id: Some(message_id.to_string()),
            message_type: Some(MESSAGE_TYPE_ACK.to_string()),
            ..Default::default()
        }
    }

    /// Sets the collapse key.
    pub fn with_collapse_key(mut self, collapse_key: &str) -> Self {
        self.collapse_key = Some(collapse_key.to_string());
        self
    }

    /// Sets the time-to-live in seconds.
    pub fn with_time_to_live(mut self, seconds: u64) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    /// Sets the delay-while-idle flag.
    pub fn with_delay_while_idle(mut self, delay: bool) -> Self {
        self.delay_while_idle = Some(delay);
        self
    }

    /// Classifies the envelope by its `message_type`.
    pub fn kind(&self) -> EnvelopeKind {
        match self.message_type.as_deref() {
            None => EnvelopeKind::Data,
            Some(MESSAGE_TYPE_ACK) => EnvelopeKind::Ack,
            Some(MESSAGE_TYPE_NACK) => EnvelopeKind::Nack,
            Some(MESSAGE_TYPE_CONTROL) => EnvelopeKind::Control,
            Some(other) => EnvelopeKind::Unknown(other.to_string()),
        }
    }
}
