//! Mock Transport
//!
//! In-memory transport for tests: scripted connect/authentication
//! failures, captured outbound frames, and injectable inbound frames.

use std::collections::VecDeque;

use super::codec;
use super::envelope::Envelope;
use super::error::RelayError;
use super::transport::{Credentials, Transport, TransportConfig, TransportResult};

/// Mock transport implementation for testing.
#[derive(Default)]
pub struct MockTransport {
    connected: bool,
    authenticated: bool,
    broken: bool,
    fail_connects: u32,
    reject_auth: bool,
    sent: Vec<Vec<u8>>,
    incoming: VecDeque<Vec<u8>>,
    auth_attempts: Vec<Credentials>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an envelope to be received, already wire-encoded.
    pub fn queue_envelope(&mut self, envelope: &Envelope) {
        self.incoming.push_back(codec::encode_envelope(envelope));
    }

    /// Queues a raw frame to be received (for malformed-input tests).
    pub fn queue_frame(&mut self, frame: Vec<u8>) {
        self.incoming.push_back(frame);
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_next_connects(&mut self, n: u32) {
        self.fail_connects = n;
    }

    /// Makes authentication fail until cleared.
    pub fn reject_authentication(&mut self, reject: bool) {
        self.reject_auth = reject;
    }

    /// Simulates a transport drop: the next send or receive fails with
    /// `ConnectionClosed` and the transport reports disconnected.
    pub fn break_connection(&mut self) {
        self.broken = true;
    }

    /// Raw frames written by the connection, in send order.
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Decoded view of the sent frames, skipping undecodable ones.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent
            .iter()
            .filter_map(|frame| codec::decode_envelope(frame).ok())
            .collect()
    }

    /// Credentials presented to `authenticate`, in order.
    pub fn auth_attempts(&self) -> &[Credentials] {
        &self.auth_attempts
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _config: &TransportConfig) -> TransportResult<()> {
        if self.fail_connects > 0 {
            self.fail_connects -= 1;
            return Err(RelayError::ConnectFailed("mock connect failure".into()));
        }
        self.connected = true;
        self.broken = false;
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> TransportResult<()> {
        if !self.connected {
            return Err(RelayError::NotConnected);
        }
        self.auth_attempts.push(credentials.clone());
        if self.reject_auth {
            return Err(RelayError::AuthenticationFailed(
                "mock credentials rejected".into(),
            ));
        }
        self.authenticated = true;
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        self.connected = false;
        self.authenticated = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_frame(&mut self, frame: &[u8]) -> TransportResult<()> {
        if !self.connected {
            return Err(RelayError::NotConnected);
        }
        if self.broken {
            self.connected = false;
            return Err(RelayError::ConnectionClosed);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn receive_frame(&mut self) -> TransportResult<Option<Vec<u8>>> {
        if !self.connected {
            return Err(RelayError::NotConnected);
        }
        if self.broken {
            self.connected = false;
            return Err(RelayError::ConnectionClosed);
        }
        Ok(self.incoming.pop_front())
    }

    fn has_pending(&self) -> bool {
        !self.incoming.is_empty()
    }
}
