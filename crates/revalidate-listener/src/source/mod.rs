mod channel;
mod postgres;
mod tls;

pub use channel::{ChannelChangeSource, ChannelSender};
pub use postgres::{PgChangeSource, DEFAULT_CONNECT_TIMEOUT};

use async_trait::async_trait;

use crate::error::Result;

/// A subscription to the data store's change notifications.
///
/// Delivery is at-most-once: a payload handed out by `next_payload` is never
/// handed out again. What happens to payloads emitted while no subscription is
/// active depends on the source. PostgreSQL drops them; the in-process
/// channel keeps them queued for the next subscription.
#[async_trait]
pub trait ChangeSource: Send {
    /// Establishes a fresh subscription, tearing down any previous one.
    async fn subscribe(&mut self) -> Result<()>;

    /// Waits for the next raw payload. `Ok(None)` means the subscription
    /// ended and must be re-established.
    async fn next_payload(&mut self) -> Result<Option<String>>;

    /// Channel name used to label metrics.
    fn channel(&self) -> &str;

    fn describe(&self) -> String;
}
