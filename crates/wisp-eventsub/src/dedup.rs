//! Delivery deduplication.
//!
//! The service may redeliver a notification with the same transport message
//! id, most often around a reconnect. The cache remembers ids inside a
//! sliding window so a redelivery never reaches the sink or the writer
//! twice.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Sliding-window cache of recently seen message ids.
#[derive(Debug)]
pub struct DedupCache {
    window: Duration,
    seen: HashMap<String, Instant>,
    order: VecDeque<(Instant, String)>,
}

impl DedupCache {
    /// A cache that remembers ids for `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `id` as seen now. Returns true if it is new.
    pub fn observe(&mut self, id: &str) -> bool {
        self.observe_at(id, Instant::now())
    }

    /// Record `id` as seen at `now`. Returns true if it is new.
    pub fn observe_at(&mut self, id: &str, now: Instant) -> bool {
        self.prune(now);
        if let Some(&first_seen) = self.seen.get(id) {
            if now.duration_since(first_seen) < self.window {
                return false;
            }
        }
        let _ = self.seen.insert(id.to_string(), now);
        self.order.push_back((now, id.to_string()));
        true
    }

    /// Ids currently tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some((stamp, _)) = self.order.front() {
            if now.duration_since(*stamp) < self.window {
                break;
            }
            if let Some((stamp, id)) = self.order.pop_front() {
                // Only drop the map entry if it was not refreshed since.
                if self.seen.get(&id) == Some(&stamp) {
                    let _ = self.seen.remove(&id);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
