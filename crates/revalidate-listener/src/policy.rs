use std::time::{Duration, Instant};

use crate::config::PolicyConfig;

/// Outcome of a single policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The window had expired; this event restarted it and was not counted.
    Rollover,
    /// Counted towards the threshold; the window is still open.
    Counted { event_count: u32 },
    /// The threshold was reached inside the window.
    Invalidate,
}

impl Decision {
    pub fn should_invalidate(&self) -> bool {
        matches!(self, Decision::Invalidate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Rollover => "rollover",
            Decision::Counted { .. } => "counted",
            Decision::Invalidate => "invalidate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationState {
    last_reset: Instant,
    event_count: u32,
}

impl InvalidationState {
    fn new(now: Instant) -> Self {
        Self {
            last_reset: now,
            event_count: 0,
        }
    }

    fn reset(&mut self, now: Instant) {
        self.last_reset = now;
        self.event_count = 0;
    }

    pub fn last_reset(&self) -> Instant {
        self.last_reset
    }

    pub fn event_count(&self) -> u32 {
        self.event_count
    }
}

/// Burst-suppression policy: approves an invalidation only once
/// `count_threshold` events have landed inside one window. An event arriving
/// after the window expired restarts the window and is not counted.
///
/// Not a debounce: a trickle slower than the threshold never fires.
#[derive(Debug, Clone)]
pub struct InvalidationPolicy {
    config: PolicyConfig,
    state: InvalidationState,
}

impl InvalidationPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: PolicyConfig, now: Instant) -> Self {
        Self {
            config,
            state: InvalidationState::new(now),
        }
    }

    pub fn decide(&mut self) -> Decision {
        self.decide_at(Instant::now())
    }

    pub fn decide_at(&mut self, now: Instant) -> Decision {
        let elapsed = now.saturating_duration_since(self.state.last_reset);

        if elapsed >= self.config.window_duration {
            self.state.reset(now);
            return Decision::Rollover;
        }

        self.state.event_count = self.state.event_count.saturating_add(1);

        if self.state.event_count >= self.config.count_threshold {
            self.state.reset(now);
            return Decision::Invalidate;
        }

        Decision::Counted {
            event_count: self.state.event_count,
        }
    }

    pub fn should_invalidate(&mut self) -> bool {
        self.decide().should_invalidate()
    }

    pub fn state(&self) -> &InvalidationState {
        &self.state
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn window_duration(&self) -> Duration {
        self.config.window_duration
    }

    pub fn count_threshold(&self) -> u32 {
        self.config.count_threshold
    }
}
