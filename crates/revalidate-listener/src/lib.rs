pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod policy;
pub mod source;
pub mod stats;

pub use config::{
    EndpointConfig, ListenerConfig, PolicyConfig, ReconnectConfig, SourceConfig,
    DEFAULT_CHANNEL, DEFAULT_ENDPOINT_PATH,
};
pub use dispatcher::{DispatchReceipt, HttpDispatcher, InvalidationDispatcher};
pub use error::{ErrorKind, ListenerError, Result};
pub use listener::{ChangeListener, EventOutcome, DEFAULT_DISPATCH_TIMEOUT};
pub use policy::{Decision, InvalidationPolicy, InvalidationState};
pub use source::{
    ChangeSource, ChannelChangeSource, ChannelSender, PgChangeSource, DEFAULT_CONNECT_TIMEOUT,
};
pub use stats::{ListenerStats, ListenerStatsSnapshot};
