// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Envelope Codec
//!
//! Encodes and decodes envelopes to/from the wire frame: a 4-byte
//! big-endian length prefix followed by the JSON-serialized envelope.
//! Pure and stateless; schema validation happens here so that a decoded
//! envelope is always usable by the router.

use super::envelope::{Envelope, EnvelopeKind};
use super::error::RelayError;

/// Frame header size (4 bytes length prefix).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum accepted envelope size in bytes (excluding the header).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Encodes an envelope to a length-prefixed JSON frame.
///
/// Never fails for a well-formed envelope; construction-time validation
/// is the caller's responsibility.
pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    let json = serde_json::to_vec(envelope).unwrap_or_default();
    let len = json.len() as u32;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + json.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&json);
    frame
}

/// Reads the payload length from a frame header.
pub fn read_frame_length(header: &[u8; FRAME_HEADER_SIZE]) -> usize {
    u32::from_be_bytes(*header) as usize
}

/// Decodes an envelope from a length-prefixed JSON frame.
///
/// Returns `MalformedEnvelope` when the frame or JSON is broken and
/// `SchemaViolation` when fields required for the detected message type
/// are absent.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, RelayError> {
    if data.len() < FRAME_HEADER_SIZE {
        return Err(RelayError::MalformedEnvelope("frame too short".into()));
    }

    let header: [u8; FRAME_HEADER_SIZE] = data[..FRAME_HEADER_SIZE]
        .try_into()
        .map_err(|_| RelayError::MalformedEnvelope("invalid frame header".into()))?;
    let expected_len = read_frame_length(&header);

    if expected_len > MAX_MESSAGE_SIZE {
        return Err(RelayError::MalformedEnvelope(format!(
            "declared length {} exceeds maximum {}",
            expected_len, MAX_MESSAGE_SIZE
        )));
    }
    if data.len() - FRAME_HEADER_SIZE != expected_len {
        return Err(RelayError::MalformedEnvelope(format!(
            "length mismatch: declared {}, got {}",
            expected_len,
            data.len() - FRAME_HEADER_SIZE
        )));
    }

    let envelope: Envelope = serde_json::from_slice(&data[FRAME_HEADER_SIZE..])
        .map_err(|e| RelayError::MalformedEnvelope(e.to_string()))?;

    validate(&envelope)?;
    Ok(envelope)
}

/// Checks that fields required for the envelope's type are present.
fn validate(envelope: &Envelope) -> Result<(), RelayError> {
    match envelope.kind() {
        EnvelopeKind::Ack | EnvelopeKind::Nack => {
            if envelope.message_id.is_none() {
                return Err(RelayError::SchemaViolation(
                    "ack/nack without message_id".into(),
                ));
            }
            if envelope.from.is_none() && envelope.to.is_none() {
                return Err(RelayError::SchemaViolation(
                    "ack/nack without from or to address".into(),
                ));
            }
        }
        EnvelopeKind::Data => {
            if envelope.to.is_none() && envelope.from.is_none() {
                return Err(RelayError::SchemaViolation(
                    "data message without to or from address".into(),
                ));
            }
        }
        // No required fields for control or unrecognized types.
        EnvelopeKind::Control | EnvelopeKind::Unknown(_) => {}
    }
    Ok(())
}
