// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message Router
//!
//! Classifies each inbound envelope and dispatches it: acks and nacks
//! resolve the correlation tracker, data messages go to the upstream
//! handler and are automatically acknowledged, control advisories are
//! recorded, and unrecognized types are logged and dropped for forward
//! compatibility. No failure here ever propagates back into the
//! connection's dispatch loop.

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use super::connection::InboundHandler;
use super::correlation::{AckOutcome, CorrelationEntry, CorrelationTracker};
use super::envelope::{Envelope, EnvelopeKind};
use std::sync::Arc;

/// External collaborator invoked once per inbound data message, before
/// the automatic ack is sent. Must not block significantly.
pub trait UpstreamHandler: Send {
    fn handle(
        &mut self,
        from: &str,
        category: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), String>;
}

impl<F> UpstreamHandler for F
where
    F: FnMut(&str, &str, &BTreeMap<String, String>) -> Result<(), String> + Send,
{
    fn handle(
        &mut self,
        from: &str,
        category: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), String> {
        self(from, category, data)
    }
}

/// Notifications about the fate of outbound messages. Retrying after a
/// nack is the application's decision, never automatic here.
pub trait DeliveryEvents: Send {
    fn on_ack(&mut self, _entry: &CorrelationEntry) {}
    fn on_nack(&mut self, _entry: &CorrelationEntry) {}
}

/// Whether an upstream handler failure suppresses the automatic ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Always ack inbound data messages (original relay behavior).
    Always,
    /// Skip the ack when the upstream handler reports an error.
    SkipOnError,
}

/// Routes inbound envelopes for a relay connection.
pub struct MessageRouter<U: UpstreamHandler> {
    tracker: Arc<CorrelationTracker>,
    upstream: U,
    events: Option<Box<dyn DeliveryEvents>>,
    ack_policy: AckPolicy,
    drain_requested: bool,
}

impl<U: UpstreamHandler> MessageRouter<U> {
    /// Creates a router over the connection's correlation tracker.
    pub fn new(tracker: Arc<CorrelationTracker>, upstream: U) -> Self {
        MessageRouter {
            tracker,
            upstream,
            events: None,
            ack_policy: AckPolicy::Always,
            drain_requested: false,
        }
    }

    /// Sets the ack policy for inbound data messages.
    pub fn with_ack_policy(mut self, ack_policy: AckPolicy) -> Self {
        self.ack_policy = ack_policy;
        self
    }

    /// Registers delivery-outcome notifications.
    pub fn on_delivery(&mut self, events: Box<dyn DeliveryEvents>) {
        self.events = Some(events);
    }

    /// True once the server has asked for the connection to be drained.
    pub fn drain_requested(&self) -> bool {
        self.drain_requested
    }

    fn route(&mut self, envelope: Envelope) -> Option<Envelope> {
        match envelope.kind() {
            EnvelopeKind::Ack => {
                self.resolve(&envelope, AckOutcome::Ack);
                None
            }
            EnvelopeKind::Nack => {
                self.resolve(&envelope, AckOutcome::Nack);
                None
            }
            EnvelopeKind::Data => self.route_data(envelope),
            EnvelopeKind::Control => {
                info!("control message received, server requests connection drain");
                self.drain_requested = true;
                None
            }
            EnvelopeKind::Unknown(message_type) => {
                warn!(%message_type, "unrecognized message type, ignoring");
                None
            }
        }
    }

    fn resolve(&mut self, envelope: &Envelope, outcome: AckOutcome) {
        let Some(message_id) = envelope.message_id.as_deref() else {
            warn!(?outcome, "ack/nack without message_id, ignoring");
            return;
        };

        match self.tracker.resolve(message_id, outcome) {
            Some(entry) => {
                if let Some(events) = self.events.as_mut() {
                    match outcome {
                        AckOutcome::Ack => events.on_ack(&entry),
                        AckOutcome::Nack => events.on_nack(&entry),
                    }
                }
            }
            None => {
                info!(
                    message_id,
                    ?outcome,
                    "ack/nack for untracked message id, ignoring"
                );
            }
        }
    }

    /// Handles an upstream data message and produces the automatic ack.
    fn route_data(&mut self, envelope: Envelope) -> Option<Envelope> {
        let Some(from) = envelope.from.as_deref() else {
            warn!("inbound data message without sender address, ignoring");
            return None;
        };

        let category = envelope.category.as_deref().unwrap_or_default();
        let empty = BTreeMap::new();
        let data = envelope.data.as_ref().unwrap_or(&empty);

        let result = self.upstream.handle(from, category, data);
        if let Err(reason) = &result {
            error!(from, category, %reason, "upstream handler failed");
            if self.ack_policy == AckPolicy::SkipOnError {
                return None;
            }
        }

        let Some(message_id) = envelope.message_id.as_deref() else {
            warn!(from, "inbound data message without message_id, not acking");
            return None;
        };
        Some(Envelope::ack(from, message_id))
    }
}

impl<U: UpstreamHandler> InboundHandler for MessageRouter<U> {
    fn handle(&mut self, envelope: Envelope) -> Option<Envelope> {
        self.route(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Received = Arc<Mutex<Vec<(String, String, BTreeMap<String, String>)>>>;

    struct RecordingHandler {
        received: Received,
        fail: bool,
    }

    impl UpstreamHandler for RecordingHandler {
        fn handle(
            &mut self,
            from: &str,
            category: &str,
            data: &BTreeMap<String, String>,
        ) -> Result<(), String> {
            self.received
                .lock()
                .unwrap()
                .push((from.to_string(), category.to_string(), data.clone()));
            if self.fail {
                Err("handler exploded".into())
            } else {
                Ok(())
            }
        }
    }

    struct RecordingEvents {
        acked: Arc<Mutex<Vec<String>>>,
        nacked: Arc<Mutex<Vec<String>>>,
    }

    impl DeliveryEvents for RecordingEvents {
        fn on_ack(&mut self, entry: &CorrelationEntry) {
            self.acked.lock().unwrap().push(entry.message_id.clone());
        }

        fn on_nack(&mut self, entry: &CorrelationEntry) {
            self.nacked.lock().unwrap().push(entry.message_id.clone());
        }
    }

    fn tracker() -> Arc<CorrelationTracker> {
        Arc::new(CorrelationTracker::new(Duration::from_secs(30)))
    }

    fn router(
        tracker: Arc<CorrelationTracker>,
        fail: bool,
    ) -> (MessageRouter<RecordingHandler>, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let handler = RecordingHandler {
            received: received.clone(),
            fail,
        };
        (MessageRouter::new(tracker, handler), received)
    }

    fn inbound_data(from: &str, message_id: &str) -> Envelope {
        let mut data = BTreeMap::new();
        data.insert("k".to_string(), "v".to_string());
        Envelope {
            from: Some(from.to_string()),
            message_id: Some(message_id.to_string()),
            category: Some("app.x".to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    fn inbound_ack(from: &str, message_id: &str) -> Envelope {
        Envelope {
            from: Some(from.to_string()),
            message_id: Some(message_id.to_string()),
            message_type: Some("ack".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_data_message_invokes_handler_then_acks() {
        let (mut router, received) = router(tracker(), false);

        let reply = router.route(inbound_data("dev2", "m5")).unwrap();
        assert_eq!(reply.kind(), EnvelopeKind::Ack);
        assert_eq!(reply.to.as_deref(), Some("dev2"));
        assert_eq!(reply.message_id.as_deref(), Some("m5"));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "dev2");
        assert_eq!(received[0].1, "app.x");
        assert_eq!(received[0].2.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_handler_failure_still_acks_by_default() {
        let (mut router, _received) = router(tracker(), true);
        let reply = router.route(inbound_data("dev2", "m5"));
        assert!(reply.is_some());
    }

    #[test]
    fn test_handler_failure_suppresses_ack_when_configured() {
        let (router, _received) = router(tracker(), true);
        let mut router = router.with_ack_policy(AckPolicy::SkipOnError);
        let reply = router.route(inbound_data("dev2", "m5"));
        assert!(reply.is_none());
    }

    #[test]
    fn test_ack_resolves_tracked_entry() {
        let tracker = tracker();
        tracker.track("m1", "dev1").unwrap();
        let (mut router, _received) = router(tracker.clone(), false);

        let acked = Arc::new(Mutex::new(Vec::new()));
        let nacked = Arc::new(Mutex::new(Vec::new()));
        router.on_delivery(Box::new(RecordingEvents {
            acked: acked.clone(),
            nacked: nacked.clone(),
        }));

        assert!(router.route(inbound_ack("dev1", "m1")).is_none());
        assert_eq!(acked.lock().unwrap().as_slice(), ["m1".to_string()]);
        assert!(nacked.lock().unwrap().is_empty());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_nack_surfaces_failure_without_retry() {
        let tracker = tracker();
        tracker.track("m2", "dev3").unwrap();
        let (mut router, _received) = router(tracker.clone(), false);

        let acked = Arc::new(Mutex::new(Vec::new()));
        let nacked = Arc::new(Mutex::new(Vec::new()));
        router.on_delivery(Box::new(RecordingEvents {
            acked: acked.clone(),
            nacked: nacked.clone(),
        }));

        let mut nack = inbound_ack("dev3", "m2");
        nack.message_type = Some("nack".to_string());
        assert!(router.route(nack).is_none());

        assert!(acked.lock().unwrap().is_empty());
        assert_eq!(nacked.lock().unwrap().as_slice(), ["m2".to_string()]);
    }

    #[test]
    fn test_nack_for_unknown_id_is_ignored() {
        let (mut router, received) = router(tracker(), false);
        let mut nack = inbound_ack("dev3", "m2");
        nack.message_type = Some("nack".to_string());

        assert!(router.route(nack).is_none());
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_type_is_dropped() {
        let (mut router, received) = router(tracker(), false);
        let mut envelope = inbound_data("dev2", "m5");
        envelope.message_type = Some("receipt".to_string());

        assert!(router.route(envelope).is_none());
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_control_sets_drain_flag() {
        let (mut router, _received) = router(tracker(), false);
        assert!(!router.drain_requested());

        let envelope = Envelope {
            message_type: Some("control".to_string()),
            ..Default::default()
        };
        assert!(router.route(envelope).is_none());
        assert!(router.drain_requested());
    }

    #[test]
    fn test_closure_upstream_handler() {
        let count = Arc::new(Mutex::new(0usize));
        let captured = count.clone();
        let upstream = move |_from: &str,
                             _category: &str,
                             _data: &BTreeMap<String, String>|
              -> Result<(), String> {
            *captured.lock().unwrap() += 1;
            Ok(())
        };

        let mut router = MessageRouter::new(tracker(), upstream);
        router.route(inbound_data("dev1", "m1"));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_data_without_message_id_not_acked() {
        let (mut router, received) = router(tracker(), false);
        let mut envelope = inbound_data("dev2", "m5");
        envelope.message_id = None;

        assert!(router.route(envelope).is_none());
        // Handler still ran; only the ack is skipped.
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
