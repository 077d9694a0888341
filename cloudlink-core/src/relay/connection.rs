// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Connection
//!
//! Owns the stream to the Cloud-Connection-Server: connect and
//! authenticate, serialize outbound envelopes, drain and dispatch
//! inbound frames in arrival order, reconnect with bounded exponential
//! backoff, and tear down terminally on `close`.
//!
//! # Example
//!
//! ```ignore
//! use cloudlink_core::relay::{Credentials, MockTransport, RelayConfig, RelayConnection};
//!
//! let mut connection = RelayConnection::new(MockTransport::new(), RelayConfig::default());
//! connection.connect(Credentials::new("sender-id", "api-key"))?;
//! let msg_id = connection.send_data("device-token", payload)?;
//!
//! // Drive the read loop and the timers from the owning thread.
//! connection.process_incoming()?;
//! connection.maintain(std::time::Instant::now())?;
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::codec;
use super::correlation::{CorrelationEntry, CorrelationTracker};
use super::envelope::{Envelope, EnvelopeKind, MessageId};
use super::error::{RelayError, RelayResult};
use super::message_id::MessageIdGenerator;
use super::transport::{ConnectionState, Credentials, Transport, TransportConfig};

/// Handler invoked for every decoded inbound envelope.
///
/// The returned envelope, if any, is sent back over the connection
/// (the router uses this to emit automatic acks). A reply send failure
/// is logged by the connection and never re-raised into the handler.
pub trait InboundHandler: Send {
    fn handle(&mut self, envelope: Envelope) -> Option<Envelope>;
}

/// What to do with `send` while the connection is not Connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPolicy {
    /// Fail immediately with `NotConnected`.
    Fail,
    /// Queue up to `capacity` envelopes and flush in order once
    /// Connected; overflow drops the oldest entry with a warning.
    Queue { capacity: usize },
}

/// Reconnection backoff parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,
    /// Ceiling for the backoff delay (milliseconds).
    pub max_delay_ms: u64,
    /// Attempts before the connection gives up and closes.
    pub max_attempts: u32,
    /// Dwell time after which a stable connection resets the attempt
    /// counter (milliseconds).
    pub stable_reset_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 10,
            stable_reset_ms: 30_000,
        }
    }
}

/// Configuration for the relay connection.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Transport configuration.
    pub transport: TransportConfig,
    /// Reconnection backoff parameters.
    pub backoff: BackoffConfig,
    /// Policy for sends while not Connected.
    pub send_policy: SendPolicy,
    /// Unacknowledged outbound messages are presumed lost after this
    /// many milliseconds and reported by `sweep_timeouts`.
    pub ack_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            transport: TransportConfig::default(),
            backoff: BackoffConfig::default(),
            send_policy: SendPolicy::Queue { capacity: 128 },
            ack_timeout_ms: 30_000,
        }
    }
}

/// Result of a successful `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Written to the transport.
    Sent,
    /// Queued for flushing once the connection is back.
    Queued,
}

/// Relay connection to the Cloud-Connection-Server.
pub struct RelayConnection<T: Transport> {
    transport: T,
    config: RelayConfig,
    state: ConnectionState,
    credentials: Option<Credentials>,
    tracker: Arc<CorrelationTracker>,
    ids: Arc<MessageIdGenerator>,
    handler: Option<Box<dyn InboundHandler>>,
    queue: VecDeque<Envelope>,
    reconnect_attempt: u32,
    next_attempt_at: Option<Instant>,
    connected_at: Option<Instant>,
}

impl<T: Transport> RelayConnection<T> {
    /// Creates a connection over the given transport.
    pub fn new(transport: T, config: RelayConfig) -> Self {
        let tracker = Arc::new(CorrelationTracker::new(Duration::from_millis(
            config.ack_timeout_ms,
        )));
        RelayConnection {
            transport,
            config,
            state: ConnectionState::Disconnected,
            credentials: None,
            tracker,
            ids: Arc::new(MessageIdGenerator::new()),
            handler: None,
            queue: VecDeque::new(),
            reconnect_attempt: 0,
            next_attempt_at: None,
            connected_at: None,
        }
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.clone()
    }

    /// Returns true if connected and authenticated.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Shared handle to the correlation tracker (for the router).
    pub fn tracker(&self) -> Arc<CorrelationTracker> {
        self.tracker.clone()
    }

    /// Shared handle to the message id generator.
    pub fn id_generator(&self) -> Arc<MessageIdGenerator> {
        self.ids.clone()
    }

    /// Registers the inbound dispatch callback.
    pub fn on_inbound(&mut self, handler: Box<dyn InboundHandler>) {
        self.handler = Some(handler);
    }

    /// Number of envelopes waiting in the send queue.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Current reconnect attempt count.
    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a mutable reference to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Connects and authenticates with the supplied credentials.
    ///
    /// Drives Disconnected -> Connecting -> Authenticating -> Connected
    /// and flushes any queued envelopes on success.
    pub fn connect(&mut self, credentials: Credentials) -> RelayResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(RelayError::Closed);
        }
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        self.establish(&credentials)?;
        self.credentials = Some(credentials);
        self.reconnect_attempt = 0;
        info!(server = %self.config.transport.server_url, "relay connection established");
        self.flush_queue();
        Ok(())
    }

    /// Terminally closes the connection. Further sends fail with
    /// `Closed`; pending backoff timers are cancelled.
    pub fn close(&mut self) {
        let _ = self.transport.disconnect();
        self.state = ConnectionState::Closed;
        self.queue.clear();
        self.next_attempt_at = None;
        self.connected_at = None;
        info!("relay connection closed");
    }

    /// Sends an envelope, tracking data messages for ack correlation.
    ///
    /// While not Connected the configured `SendPolicy` applies. A
    /// duplicate message id is logged as an error and the send is still
    /// attempted; correlation for that message is unreliable.
    pub fn send(&mut self, envelope: Envelope) -> RelayResult<SendStatus> {
        if self.state == ConnectionState::Closed {
            return Err(RelayError::Closed);
        }

        self.track_outbound(&envelope);

        if self.state != ConnectionState::Connected {
            return self.enqueue(envelope);
        }

        match self.write_envelope(&envelope) {
            Ok(()) => Ok(SendStatus::Sent),
            Err(e) => {
                warn!(error = %e, "transport write failed");
                self.begin_reconnect();
                match self.config.send_policy {
                    SendPolicy::Queue { .. } => self.enqueue(envelope),
                    SendPolicy::Fail => Err(e),
                }
            }
        }
    }

    /// Convenience: builds and sends a data message, generating the
    /// message id. Returns the id for correlation.
    pub fn send_data(&mut self, to: &str, data: BTreeMap<String, String>) -> RelayResult<MessageId> {
        let message_id = self.ids.next();
        let envelope = Envelope::data_message(to, &message_id, data);
        self.send(envelope)?;
        Ok(message_id)
    }

    /// Drains available inbound frames, decodes them and dispatches the
    /// envelopes to the registered handler in arrival order.
    ///
    /// Decode failures are logged and the frame discarded; a transport
    /// failure transitions to Reconnecting. Returns the number of
    /// envelopes dispatched.
    pub fn process_incoming(&mut self) -> RelayResult<usize> {
        if self.state == ConnectionState::Closed {
            return Err(RelayError::Closed);
        }

        let mut dispatched = 0;
        while self.state == ConnectionState::Connected {
            let frame = match self.transport.receive_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(RelayError::MalformedEnvelope(reason)) => {
                    // Frame-level garbage, not a broken stream.
                    warn!(%reason, "discarding unreadable inbound frame");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "transport read failed");
                    self.begin_reconnect();
                    break;
                }
            };

            let envelope = match codec::decode_envelope(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, "discarding undecodable inbound envelope");
                    continue;
                }
            };

            dispatched += 1;
            let reply = match self.handler.as_mut() {
                Some(handler) => handler.handle(envelope),
                None => {
                    debug!("inbound envelope dropped: no handler registered");
                    None
                }
            };

            if let Some(reply) = reply {
                if let Err(e) = self.send(reply) {
                    warn!(error = %e, "failed to send reply for inbound message");
                }
            }
        }
        Ok(dispatched)
    }

    /// Drives the timers: backoff-scheduled reconnect attempts and the
    /// stable-dwell reset of the attempt counter. Call periodically.
    ///
    /// Returns `MaxRetriesExceeded` once the attempt ceiling is hit, at
    /// which point the connection is Closed.
    pub fn maintain(&mut self, now: Instant) -> RelayResult<()> {
        match self.state {
            ConnectionState::Connected => {
                if let Some(connected_at) = self.connected_at {
                    let dwell = Duration::from_millis(self.config.backoff.stable_reset_ms);
                    if self.reconnect_attempt > 0 && now.duration_since(connected_at) >= dwell {
                        debug!("connection stable, resetting backoff counter");
                        self.reconnect_attempt = 0;
                    }
                }
                Ok(())
            }
            ConnectionState::Reconnecting { .. } => {
                if self.next_attempt_at.is_some_and(|at| now >= at) {
                    self.try_reconnect(now)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Removes and returns correlation entries unacknowledged past the
    /// ack timeout, for the caller to retry or give up.
    pub fn sweep_timeouts(&mut self, now: Instant) -> Vec<CorrelationEntry> {
        let expired = self.tracker.sweep(now);
        if !expired.is_empty() {
            warn!(
                count = expired.len(),
                "outbound messages unacknowledged past timeout"
            );
        }
        expired
    }

    /// Runs the transport connect + credential exchange state machine.
    fn establish(&mut self, credentials: &Credentials) -> RelayResult<()> {
        self.state = ConnectionState::Connecting;
        if let Err(e) = self.transport.connect(&self.config.transport) {
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.state = ConnectionState::Authenticating;
        if let Err(e) = self.transport.authenticate(credentials) {
            let _ = self.transport.disconnect();
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.state = ConnectionState::Connected;
        self.connected_at = Some(Instant::now());
        self.next_attempt_at = None;
        Ok(())
    }

    /// Registers a data envelope with the correlation tracker.
    fn track_outbound(&mut self, envelope: &Envelope) {
        if envelope.kind() != EnvelopeKind::Data {
            return;
        }
        let Some(message_id) = envelope.message_id.as_deref() else {
            return;
        };
        let destination = envelope.to.as_deref().unwrap_or_default();
        if let Err(e) = self.tracker.track(message_id, destination) {
            // Generator or caller bug; the send still goes out but
            // correlation for this id is unreliable.
            error!(message_id, error = %e, "duplicate outbound message id");
        }
    }

    fn write_envelope(&mut self, envelope: &Envelope) -> RelayResult<()> {
        let frame = codec::encode_envelope(envelope);
        self.transport.send_frame(&frame)
    }

    fn enqueue(&mut self, envelope: Envelope) -> RelayResult<SendStatus> {
        match self.config.send_policy {
            SendPolicy::Fail => Err(RelayError::NotConnected),
            SendPolicy::Queue { capacity } => {
                if self.queue.len() >= capacity {
                    let dropped = self.queue.pop_front();
                    warn!(
                        dropped_id = dropped.and_then(|e| e.message_id).as_deref(),
                        "send queue full, dropping oldest envelope"
                    );
                }
                self.queue.push_back(envelope);
                Ok(SendStatus::Queued)
            }
        }
    }

    /// Flushes queued envelopes in original send order.
    fn flush_queue(&mut self) {
        while let Some(envelope) = self.queue.pop_front() {
            if let Err(e) = self.write_envelope(&envelope) {
                warn!(error = %e, "flush interrupted, requeueing envelope");
                self.queue.push_front(envelope);
                self.begin_reconnect();
                break;
            }
        }
    }

    /// Transitions Connected -> Reconnecting and schedules the next
    /// attempt after the current backoff delay.
    fn begin_reconnect(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let _ = self.transport.disconnect();
        self.connected_at = None;
        self.state = ConnectionState::Reconnecting {
            attempt: self.reconnect_attempt,
        };
        let delay = self.backoff_delay();
        self.next_attempt_at = Some(Instant::now() + delay);
        warn!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.reconnect_attempt,
            "connection lost, reconnect scheduled"
        );
    }

    /// One scheduled reconnect attempt.
    fn try_reconnect(&mut self, now: Instant) -> RelayResult<()> {
        if self.reconnect_attempt >= self.config.backoff.max_attempts {
            error!(
                attempts = self.reconnect_attempt,
                "reconnect ceiling reached, closing connection"
            );
            self.close();
            return Err(RelayError::MaxRetriesExceeded);
        }
        self.reconnect_attempt += 1;

        let Some(credentials) = self.credentials.clone() else {
            // connect() was never called; nothing to resume.
            self.state = ConnectionState::Disconnected;
            return Err(RelayError::NotConnected);
        };

        info!(attempt = self.reconnect_attempt, "attempting reconnect");
        match self.establish(&credentials) {
            Ok(()) => {
                info!(attempt = self.reconnect_attempt, "reconnected");
                self.flush_queue();
                Ok(())
            }
            Err(e) => {
                if self.reconnect_attempt >= self.config.backoff.max_attempts {
                    error!(error = %e, "final reconnect attempt failed, closing connection");
                    self.close();
                    return Err(RelayError::MaxRetriesExceeded);
                }
                self.state = ConnectionState::Reconnecting {
                    attempt: self.reconnect_attempt,
                };
                let delay = self.backoff_delay();
                self.next_attempt_at = Some(now + delay);
                warn!(
                    error = %e,
                    attempt = self.reconnect_attempt,
                    delay_ms = delay.as_millis() as u64,
                    "reconnect attempt failed, retrying after backoff"
                );
                Ok(())
            }
        }
    }

    /// Exponential backoff delay for the current attempt, capped.
    fn backoff_delay(&self) -> Duration {
        let shift = self.reconnect_attempt.min(16);
        let delay = self
            .config
            .backoff
            .base_delay_ms
            .saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.config.backoff.max_delay_ms))
    }
}
