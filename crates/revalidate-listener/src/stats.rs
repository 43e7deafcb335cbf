use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub events_received: u64,
    pub events_rejected: u64,
    pub events_suppressed: u64,
    pub invalidations_approved: u64,
    pub dispatches_succeeded: u64,
    pub dispatches_failed: u64,
    pub subscriptions: u64,
    pub subscription_failures: u64,
    pub stream_interruptions: u64,
}

#[derive(Debug, Default)]
pub struct ListenerStats {
    events_received: AtomicU64,
    events_rejected: AtomicU64,
    events_suppressed: AtomicU64,
    invalidations_approved: AtomicU64,
    dispatches_succeeded: AtomicU64,
    dispatches_failed: AtomicU64,
    subscriptions: AtomicU64,
    subscription_failures: AtomicU64,
    stream_interruptions: AtomicU64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.events_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approved(&self) {
        self.invalidations_approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, success: bool) {
        if success {
            self.dispatches_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dispatches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_subscription(&self, success: bool) {
        if success {
            self.subscriptions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.subscription_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_interruption(&self) {
        self.stream_interruptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            events_suppressed: self.events_suppressed.load(Ordering::Relaxed),
            invalidations_approved: self.invalidations_approved.load(Ordering::Relaxed),
            dispatches_succeeded: self.dispatches_succeeded.load(Ordering::Relaxed),
            dispatches_failed: self.dispatches_failed.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            subscription_failures: self.subscription_failures.load(Ordering::Relaxed),
            stream_interruptions: self.stream_interruptions.load(Ordering::Relaxed),
        }
    }
}
