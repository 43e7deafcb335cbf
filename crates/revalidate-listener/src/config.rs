use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;

use reqwest::Url;
use revalidate_core::TagMapping;

use crate::error::{ListenerError, Result};

pub const DEFAULT_CHANNEL: &str = "data_change_notification";
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/invalidate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub window_duration: Duration,
    pub count_threshold: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            window_duration: Duration::from_secs(60 * 60),
            count_threshold: 60,
        }
    }
}

impl PolicyConfig {
    pub fn new(window_duration: Duration, count_threshold: u32) -> Self {
        Self {
            window_duration,
            count_threshold,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_duration.is_zero() {
            return Err(ListenerError::Config(
                "window duration must be greater than zero".to_string(),
            ));
        }
        if self.count_threshold == 0 {
            return Err(ListenerError::Config(
                "count threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub database_url: String,
    pub channel: String,
}

impl SourceConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(ListenerError::Config("database url is required".to_string()));
        }
        validate_channel_name(&self.channel)
    }
}

/// Channel names are spliced into `LISTEN` as quoted identifiers, so only
/// plain identifiers pass.
pub fn validate_channel_name(channel: &str) -> Result<()> {
    let mut chars = channel.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start
        || channel.len() > 63
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ListenerError::Config(format!(
            "invalid channel name '{}'",
            channel
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub base_url: String,
    pub path: String,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: DEFAULT_ENDPOINT_PATH.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let joined = format!("{}/{}", base, path);
        let url = Url::parse(&joined).map_err(|e| {
            ListenerError::Config(format!("invalid endpoint url '{}': {}", joined, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ListenerError::Config(format!(
                "unsupported endpoint scheme '{}'",
                other
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ListenerError::Config(
                "dispatch timeout must be greater than zero".to_string(),
            ));
        }
        self.url().map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_fraction: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            jitter_fraction: 0.5,
        }
    }
}

impl ReconnectConfig {
    /// Delay before re-subscribe attempt `attempt` (0-based): doubles from
    /// `initial_backoff` up to `max_backoff`, then stretched by up to
    /// `jitter_fraction` of itself.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self
            .initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff);
        delay.saturating_add(delay.mul_f64(self.jitter_fraction * jitter_sample()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_backoff < self.initial_backoff {
            return Err(ListenerError::Config(
                "max reconnect backoff is smaller than the initial backoff".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(ListenerError::Config(format!(
                "jitter fraction {} is outside 0..=1",
                self.jitter_fraction
            )));
        }
        Ok(())
    }
}

/// Uniform sample in `[0, 1)`. Each `RandomState` is seeded with fresh keys,
/// so hashing nothing is enough.
fn jitter_sample() -> f64 {
    let bits = RandomState::new().build_hasher().finish();
    (bits >> 11) as f64 / (1u64 << 53) as f64
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub policy: PolicyConfig,
    pub source: SourceConfig,
    pub endpoint: EndpointConfig,
    pub reconnect: ReconnectConfig,
    pub tags: TagMapping,
}

impl ListenerConfig {
    pub fn new(source: SourceConfig, endpoint: EndpointConfig) -> Self {
        Self {
            policy: PolicyConfig::default(),
            source,
            endpoint,
            reconnect: ReconnectConfig::default(),
            tags: TagMapping::default(),
        }
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_tags(mut self, tags: TagMapping) -> Self {
        self.tags = tags;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.source.validate()?;
        self.endpoint.validate()?;
        self.reconnect.validate()
    }
}
