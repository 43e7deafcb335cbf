use std::sync::Arc;
use std::time::{Duration, Instant};

use revalidate_core::{ChangeEvent, InvalidationTag, TagMapping};
use revalidate_metrics::ListenerCollector;
use tokio::sync::watch;

use crate::config::{ListenerConfig, ReconnectConfig};
use crate::dispatcher::{DispatchReceipt, InvalidationDispatcher};
use crate::error::{ListenerError, Result};
use crate::policy::{Decision, InvalidationPolicy};
use crate::source::ChangeSource;
use crate::stats::ListenerStats;

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The payload exceeded the cache key limit.
    Rejected,
    /// The policy declined to invalidate.
    Suppressed(Decision),
    Invalidated {
        tag: InvalidationTag,
        receipt: DispatchReceipt,
    },
    /// The policy approved but the dispatch failed; the policy state is kept.
    DispatchFailed { tag: InvalidationTag },
}

impl EventOutcome {
    pub fn approved(&self) -> bool {
        matches!(
            self,
            EventOutcome::Invalidated { .. } | EventOutcome::DispatchFailed { .. }
        )
    }
}

/// Owns the change subscription, the invalidation policy and the dispatcher,
/// and drives events through them one at a time.
pub struct ChangeListener<S, D> {
    source: S,
    dispatcher: D,
    policy: InvalidationPolicy,
    tags: TagMapping,
    reconnect: ReconnectConfig,
    dispatch_timeout: Duration,
    stats: Arc<ListenerStats>,
    collector: ListenerCollector,
}

impl<S, D> ChangeListener<S, D>
where
    S: ChangeSource,
    D: InvalidationDispatcher,
{
    pub fn new(source: S, dispatcher: D, policy: InvalidationPolicy) -> Self {
        let collector = ListenerCollector::new(source.channel());
        Self {
            source,
            dispatcher,
            policy,
            tags: TagMapping::default(),
            reconnect: ReconnectConfig::default(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            stats: Arc::new(ListenerStats::new()),
            collector,
        }
    }

    pub fn from_config(source: S, dispatcher: D, config: &ListenerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(source, dispatcher, InvalidationPolicy::new(config.policy))
            .with_tags(config.tags.clone())
            .with_reconnect(config.reconnect.clone())
            .with_dispatch_timeout(config.endpoint.timeout))
    }

    pub fn with_tags(mut self, tags: TagMapping) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &InvalidationPolicy {
        &self.policy
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    pub fn tags(&self) -> &TagMapping {
        &self.tags
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped),
    /// re-subscribing with backoff whenever the subscription is lost.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let subscribed = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                subscribed = self.source.subscribe() => subscribed,
            };

            match subscribed {
                Ok(()) => {
                    tracing::info!(source = %self.source.describe(), "Subscribed to change source");
                    self.stats.record_subscription(true);
                    self.collector.record_subscription(true);
                    attempt = 0;
                }
                Err(e) => {
                    tracing::warn!(
                        source = %self.source.describe(),
                        attempt,
                        error = %e,
                        "Failed to subscribe to change source"
                    );
                    self.stats.record_subscription(false);
                    self.collector.record_subscription(false);
                    if self.wait_before_resubscribe(attempt, &mut shutdown).await {
                        break;
                    }
                    attempt = attempt.saturating_add(1);
                    continue;
                }
            }

            loop {
                let next = tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Change listener shutting down");
                            return;
                        }
                        continue;
                    }
                    next = self.source.next_payload() => next,
                };

                match next {
                    Ok(Some(payload)) => {
                        self.process_payload(&payload).await;
                    }
                    Ok(None) => {
                        tracing::info!("Change stream ended");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Change stream error");
                        break;
                    }
                }
            }

            self.stats.record_interruption();
            self.collector.record_stream_interrupted();

            if self.wait_before_resubscribe(attempt, &mut shutdown).await {
                break;
            }
            attempt = attempt.saturating_add(1);
        }

        tracing::info!("Change listener stopped");
    }

    /// Returns `true` when shutdown was requested while waiting.
    async fn wait_before_resubscribe(
        &self,
        attempt: u32,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let delay = self.reconnect.delay_for_attempt(attempt);
        tracing::debug!(?delay, attempt, "Waiting before re-subscribing");

        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }

    pub async fn process_payload(&mut self, payload: &str) -> EventOutcome {
        self.process_payload_at(payload, Instant::now()).await
    }

    pub async fn process_payload_at(&mut self, payload: &str, now: Instant) -> EventOutcome {
        self.stats.record_received();
        self.collector.record_event_received();

        match ChangeEvent::from_payload(payload) {
            Ok(event) => self.handle_event(&event, now).await,
            Err(e) => {
                let err = ListenerError::from(e);
                tracing::warn!(error = %err, "Skipping change event");
                self.stats.record_rejected();
                self.collector.record_event_rejected();
                EventOutcome::Rejected
            }
        }
    }

    pub async fn process_event(&mut self, event: &ChangeEvent) -> EventOutcome {
        self.process_event_at(event, Instant::now()).await
    }

    pub async fn process_event_at(&mut self, event: &ChangeEvent, now: Instant) -> EventOutcome {
        self.stats.record_received();
        self.collector.record_event_received();
        self.handle_event(event, now).await
    }

    async fn handle_event(&mut self, event: &ChangeEvent, now: Instant) -> EventOutcome {
        tracing::info!(cache_key = %event.cache_key(), "Data changed");

        let decision = self.policy.decide_at(now);
        self.collector.record_decision(decision.as_str());
        self.collector
            .set_window_event_count(self.policy.state().event_count());

        if !decision.should_invalidate() {
            tracing::debug!(
                cache_key = %event.cache_key(),
                decision = decision.as_str(),
                window_events = self.policy.state().event_count(),
                "Cache invalidation not needed"
            );
            self.stats.record_suppressed();
            return EventOutcome::Suppressed(decision);
        }

        self.stats.record_approved();
        let tag = self.tags.tag_for(event).clone();

        match self.dispatch(&tag).await {
            Ok(receipt) => {
                tracing::info!(
                    cache_key = %event.cache_key(),
                    tag = %tag,
                    status = receipt.status,
                    revalidated = ?receipt.revalidated,
                    "Cache invalidated"
                );
                EventOutcome::Invalidated { tag, receipt }
            }
            Err(e) => {
                tracing::warn!(
                    cache_key = %event.cache_key(),
                    tag = %tag,
                    error = %e,
                    "Cache invalidation dispatch failed"
                );
                EventOutcome::DispatchFailed { tag }
            }
        }
    }

    async fn dispatch(&self, tag: &InvalidationTag) -> Result<DispatchReceipt> {
        let started = Instant::now();
        let result =
            match tokio::time::timeout(self.dispatch_timeout, self.dispatcher.dispatch(tag)).await {
                Ok(result) => result,
                Err(_) => Err(ListenerError::DispatchTimeout(self.dispatch_timeout)),
            };

        let success = result.is_ok();
        self.stats.record_dispatch(success);
        self.collector
            .record_dispatch(tag.as_str(), success, started.elapsed().as_secs_f64());
        result
    }
}
