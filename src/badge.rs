//! Pending-downloads counter surfaced as a UI badge

use std::sync::atomic::{AtomicU64, Ordering};

/// Count of in-flight and paused transfers.
///
/// Incremented once per `started` event, decremented once per terminal
/// event, re-seeded from the registry at view-attach time. A decrement
/// below zero signals a missed start or a double-counted terminal event;
/// it is clamped and logged rather than allowed to wrap.
#[derive(Debug, Default)]
pub struct BadgeCounter {
    count: AtomicU64,
}

impl BadgeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self) {
        let result = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
        if result.is_err() {
            log::warn!("badge counter decremented below zero; clamping at zero");
        }
    }

    pub fn reset_to(&self, value: u64) {
        self.count.store(value, Ordering::SeqCst);
    }
}
