// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Correlation Tracker
//!
//! In-memory table mapping an outbound message id to its pending-ack
//! state. One mutex guards the whole mapping so `track`, `resolve` and
//! `sweep` are mutually exclusive.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use super::envelope::MessageId;
use super::error::RelayError;

/// Outcome reported for a correlated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Ack,
    Nack,
}

/// One outbound message awaiting an ack or nack.
#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    /// Message id the ack/nack will echo.
    pub message_id: MessageId,
    /// Destination address the message was sent to.
    pub destination: String,
    /// When the message was handed to the connection.
    pub sent_at: Instant,
    /// Retries performed by the caller for this message.
    pub retry_count: u32,
}

/// Tracks pending outbound messages until they are acknowledged,
/// negatively acknowledged, or swept after the ack timeout.
pub struct CorrelationTracker {
    entries: Mutex<HashMap<MessageId, CorrelationEntry>>,
    ack_timeout: Duration,
}

impl CorrelationTracker {
    /// Creates a tracker; entries older than `ack_timeout` are swept.
    pub fn new(ack_timeout: Duration) -> Self {
        CorrelationTracker {
            entries: Mutex::new(HashMap::new()),
            ack_timeout,
        }
    }

    /// Registers a pending outbound message.
    ///
    /// Rejects an id that is already tracked: a collision means the id
    /// generator or the caller is broken.
    pub fn track(&self, message_id: &str, destination: &str) -> Result<(), RelayError> {
        let mut entries = self.entries.lock().expect("correlation lock poisoned");
        if entries.contains_key(message_id) {
            return Err(RelayError::DuplicateId(message_id.to_string()));
        }
        entries.insert(
            message_id.to_string(),
            CorrelationEntry {
                message_id: message_id.to_string(),
                destination: destination.to_string(),
                sent_at: Instant::now(),
                retry_count: 0,
            },
        );
        Ok(())
    }

    /// Removes and returns the entry for `message_id`, if tracked.
    ///
    /// `None` means the ack/nack refers to an id we never sent or one
    /// already resolved; the caller logs and discards it.
    pub fn resolve(&self, message_id: &str, outcome: AckOutcome) -> Option<CorrelationEntry> {
        let entry = self
            .entries
            .lock()
            .expect("correlation lock poisoned")
            .remove(message_id);
        if entry.is_some() {
            debug!(message_id, ?outcome, "correlation entry resolved");
        }
        entry
    }

    /// Removes and returns all entries older than the ack timeout,
    /// measured against `now`. The caller decides on retry or giving up.
    pub fn sweep(&self, now: Instant) -> Vec<CorrelationEntry> {
        let mut entries = self.entries.lock().expect("correlation lock poisoned");
        let expired_ids: Vec<MessageId> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.sent_at) > self.ack_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        expired_ids
            .iter()
            .filter_map(|id| entries.remove(id))
            .collect()
    }

    /// Number of messages currently awaiting an ack/nack.
    pub fn pending_count(&self) -> usize {
        self.entries.lock().expect("correlation lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> CorrelationTracker {
        CorrelationTracker::new(Duration::from_secs(30))
    }

    #[test]
    fn test_track_and_resolve_once() {
        let tracker = tracker();
        tracker.track("m1", "dev1").unwrap();
        assert_eq!(tracker.pending_count(), 1);

        let entry = tracker.resolve("m1", AckOutcome::Ack).unwrap();
        assert_eq!(entry.message_id, "m1");
        assert_eq!(entry.destination, "dev1");

        // Second resolve for the same id finds nothing.
        assert!(tracker.resolve("m1", AckOutcome::Ack).is_none());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_track_duplicate_rejected() {
        let tracker = tracker();
        tracker.track("m1", "dev1").unwrap();
        let result = tracker.track("m1", "dev2");
        assert!(matches!(result, Err(RelayError::DuplicateId(_))));
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn test_resolve_unknown_returns_none() {
        let tracker = tracker();
        assert!(tracker.resolve("never-sent", AckOutcome::Nack).is_none());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let tracker = tracker();
        tracker.track("m1", "dev1").unwrap();
        tracker.track("m2", "dev2").unwrap();

        // Nothing has aged past the timeout yet.
        assert!(tracker.sweep(Instant::now()).is_empty());
        assert_eq!(tracker.pending_count(), 2);

        let later = Instant::now() + Duration::from_secs(31);
        let expired = tracker.sweep(later);
        assert_eq!(expired.len(), 2);
        assert_eq!(tracker.pending_count(), 0);

        // Swept entries are gone for good.
        assert!(tracker.sweep(later).is_empty());
    }

    #[test]
    fn test_operations_atomic_across_threads() {
        use std::sync::Arc;

        let tracker = Arc::new(tracker());
        let mut handles = Vec::new();
        for t in 0..4 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    tracker.track(&format!("m-{}-{}", t, i), "dev").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.pending_count(), 1000);
    }
}
