// SPDX-FileCopyrightText: 2026 Cloudlink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message Id Generator
//!
//! Produces a collision-resistant id for each outbound envelope. The
//! primary scheme is a random UUID v4; if that ever yields an empty id
//! the generator degrades to a process-local counter combined with a
//! random salt, so `next()` never returns an empty or
//! duplicate-by-construction value.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;
use uuid::Uuid;

use super::envelope::MessageId;

/// Thread-safe message id generator.
pub struct MessageIdGenerator {
    /// Random per-process salt for the fallback scheme.
    salt: u64,
    /// Monotonic counter for the fallback scheme.
    fallback_seq: AtomicU64,
}

impl MessageIdGenerator {
    /// Creates a generator with a fresh random salt.
    pub fn new() -> Self {
        MessageIdGenerator {
            salt: rand::random::<u64>(),
            fallback_seq: AtomicU64::new(0),
        }
    }

    /// Returns the next unique message id. Never fails, never empty.
    pub fn next(&self) -> MessageId {
        let id = Uuid::new_v4().to_string();
        if id.is_empty() {
            error!("uuid generation produced an empty id, degrading to counter scheme");
            return self.fallback();
        }
        id
    }

    /// Secondary scheme: random salt plus monotonic counter.
    fn fallback(&self) -> MessageId {
        let seq = self.fallback_seq.fetch_add(1, Ordering::Relaxed);
        format!("m-{:016x}-{}", self.salt, seq)
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// INLINE_TEST_REQUIRED: Tests the private fallback scheme directly
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_next_never_empty() {
        let generator = MessageIdGenerator::new();
        for _ in 0..100 {
            assert!(!generator.next().is_empty());
        }
    }

    #[test]
    fn test_next_unique_sequential() {
        let generator = MessageIdGenerator::new();
        let ids: HashSet<_> = (0..10_000).map(|_| generator.next()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_next_unique_concurrent() {
        let generator = Arc::new(MessageIdGenerator::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let generator = generator.clone();
            handles.push(std::thread::spawn(move || {
                (0..1_250).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate id from concurrent next()");
            }
        }
        assert_eq!(all.len(), 10_000);
    }

    #[test]
    fn test_fallback_unique_and_non_empty() {
        let generator = MessageIdGenerator::new();
        let a = generator.fallback();
        let b = generator.fallback();
        assert!(!a.is_empty());
        assert_ne!(a, b);
        assert!(a.starts_with("m-"));
    }
}
