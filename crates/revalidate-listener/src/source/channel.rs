use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::ChangeSource;
use crate::error::{ListenerError, Result};

#[derive(Debug)]
enum SourceMessage {
    Payload(String),
    Disconnect,
}

#[derive(Debug, Default)]
struct ChannelState {
    subscriptions: AtomicU32,
    pending_subscribe_failures: AtomicU32,
}

/// Feeds an in-process [`ChannelChangeSource`]. Can also simulate a dropped
/// connection or a store that refuses new subscriptions.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<SourceMessage>,
    state: Arc<ChannelState>,
}

impl ChannelSender {
    pub fn send(&self, payload: impl Into<String>) -> bool {
        self.tx.send(SourceMessage::Payload(payload.into())).is_ok()
    }

    pub fn disconnect(&self) -> bool {
        self.tx.send(SourceMessage::Disconnect).is_ok()
    }

    pub fn fail_next_subscribes(&self, count: u32) {
        self.state
            .pending_subscribe_failures
            .store(count, Ordering::SeqCst);
    }

    pub fn subscription_count(&self) -> u32 {
        self.state.subscriptions.load(Ordering::SeqCst)
    }
}

/// Change source backed by an in-process channel, for embedding the listener
/// behind something other than PostgreSQL.
#[derive(Debug)]
pub struct ChannelChangeSource {
    rx: mpsc::UnboundedReceiver<SourceMessage>,
    state: Arc<ChannelState>,
    subscribed: bool,
}

impl ChannelChangeSource {
    pub fn new() -> (ChannelSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(ChannelState::default());
        let sender = ChannelSender {
            tx,
            state: Arc::clone(&state),
        };
        let source = Self {
            rx,
            state,
            subscribed: false,
        };
        (sender, source)
    }

    fn take_subscribe_failure(&self) -> bool {
        self.state
            .pending_subscribe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChangeSource for ChannelChangeSource {
    async fn subscribe(&mut self) -> Result<()> {
        if self.take_subscribe_failure() {
            self.subscribed = false;
            return Err(ListenerError::Subscription(
                "channel refused subscription".to_string(),
            ));
        }
        self.state.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.subscribed = true;
        Ok(())
    }

    async fn next_payload(&mut self) -> Result<Option<String>> {
        if !self.subscribed {
            return Err(ListenerError::Subscription("not subscribed".to_string()));
        }
        match self.rx.recv().await {
            Some(SourceMessage::Payload(payload)) => Ok(Some(payload)),
            Some(SourceMessage::Disconnect) => {
                self.subscribed = false;
                Err(ListenerError::Subscription("channel disconnected".to_string()))
            }
            None => {
                self.subscribed = false;
                Ok(None)
            }
        }
    }

    fn channel(&self) -> &str {
        "in-process"
    }

    fn describe(&self) -> String {
        "in-process channel".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_delivers_in_order() {
        let (sender, mut source) = ChannelChangeSource::new();
        source.subscribe().await.unwrap();

        assert!(sender.send("a"));
        assert!(sender.send("b"));

        assert_eq!(source.next_payload().await.unwrap().as_deref(), Some("a"));
        assert_eq!(source.next_payload().await.unwrap().as_deref(), Some("b"));
        assert_eq!(sender.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_source_requires_subscription() {
        let (_sender, mut source) = ChannelChangeSource::new();
        assert!(source.next_payload().await.is_err());
    }

    #[tokio::test]
    async fn test_channel_source_disconnect() {
        let (sender, mut source) = ChannelChangeSource::new();
        source.subscribe().await.unwrap();

        sender.disconnect();
        sender.send("after");

        let err = source.next_payload().await.unwrap_err();
        assert!(err.to_string().contains("disconnected"));
        assert!(source.next_payload().await.is_err());

        source.subscribe().await.unwrap();
        assert_eq!(
            source.next_payload().await.unwrap().as_deref(),
            Some("after")
        );
        assert_eq!(sender.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_source_subscribe_failures() {
        let (sender, mut source) = ChannelChangeSource::new();
        sender.fail_next_subscribes(2);

        assert!(source.subscribe().await.is_err());
        assert!(source.subscribe().await.is_err());
        assert!(source.subscribe().await.is_ok());
        assert_eq!(sender.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_dropped() {
        let (sender, mut source) = ChannelChangeSource::new();
        source.subscribe().await.unwrap();
        drop(sender);
        assert_eq!(source.next_payload().await.unwrap(), None);
    }
}
