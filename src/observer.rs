//! Delivery counters reported by the dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives counts as the dispatcher works through batches. All methods
/// default to doing nothing.
pub trait Observer: Send + Sync {
    fn new_batch(&self, _events: usize) {}

    fn acked(&self, _events: usize) {}

    fn dropped(&self, _events: usize) {}

    fn failed(&self, _events: usize) {}

    fn permanently_failed(&self, _events: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Keeps running totals that can be read at any time.
#[derive(Debug, Default)]
pub struct CountingObserver {
    batches: AtomicUsize,
    events: AtomicUsize,
    acked: AtomicUsize,
    dropped: AtomicUsize,
    failed: AtomicUsize,
    permanently_failed: AtomicUsize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObserverSnapshot {
    pub batches: usize,
    pub events: usize,
    pub acked: usize,
    pub dropped: usize,
    pub failed: usize,
    pub permanently_failed: usize,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        ObserverSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            permanently_failed: self.permanently_failed.load(Ordering::Relaxed),
        }
    }
}

impl Observer for CountingObserver {
    fn new_batch(&self, events: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(events, Ordering::Relaxed);
    }

    fn acked(&self, events: usize) {
        self.acked.fetch_add(events, Ordering::Relaxed);
    }

    fn dropped(&self, events: usize) {
        self.dropped.fetch_add(events, Ordering::Relaxed);
    }

    fn failed(&self, events: usize) {
        self.failed.fetch_add(events, Ordering::Relaxed);
    }

    fn permanently_failed(&self, events: usize) {
        self.permanently_failed.fetch_add(events, Ordering::Relaxed);
    }
}
