use metrics::{counter, gauge, histogram};

pub struct ListenerCollector {
    channel: String,
}

impl ListenerCollector {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn record_event_received(&self) {
        let labels = [("channel", self.channel.clone())];
        counter!("revalidate_events_received_total", &labels).increment(1);
    }

    pub fn record_event_rejected(&self) {
        let labels = [("channel", self.channel.clone())];
        counter!("revalidate_events_rejected_total", &labels).increment(1);
    }

    pub fn record_decision(&self, decision: &str) {
        let labels = [
            ("channel", self.channel.clone()),
            ("decision", decision.to_string()),
        ];
        counter!("revalidate_policy_decisions_total", &labels).increment(1);
    }

    pub fn set_window_event_count(&self, count: u32) {
        let labels = [("channel", self.channel.clone())];
        gauge!("revalidate_policy_window_events", &labels).set(count as f64);
    }

    pub fn record_dispatch(&self, tag: &str, success: bool, duration_secs: f64) {
        let labels = [
            ("channel", self.channel.clone()),
            ("tag", tag.to_string()),
        ];
        counter!("revalidate_dispatches_total", &labels).increment(1);
        histogram!("revalidate_dispatch_duration_seconds", &labels).record(duration_secs);

        if !success {
            counter!("revalidate_dispatches_failed_total", &labels).increment(1);
        }
    }

    pub fn record_subscription(&self, success: bool) {
        let labels = [
            ("channel", self.channel.clone()),
            (
                "result",
                if success { "ok" } else { "error" }.to_string(),
            ),
        ];
        counter!("revalidate_subscriptions_total", &labels).increment(1);
    }

    pub fn record_stream_interrupted(&self) {
        let labels = [("channel", self.channel.clone())];
        counter!("revalidate_stream_interruptions_total", &labels).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_collector() {
        let collector = ListenerCollector::new("data_change_notification");
        assert_eq!(collector.channel(), "data_change_notification");

        collector.record_event_received();
        collector.record_event_rejected();
        collector.record_decision("counted");
        collector.record_decision("invalidate");
        collector.set_window_event_count(12);
        collector.record_dispatch("user-data", true, 0.05);
        collector.record_dispatch("user-data", false, 10.0);
        collector.record_subscription(true);
        collector.record_subscription(false);
        collector.record_stream_interrupted();
    }
}
