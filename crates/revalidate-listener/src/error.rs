use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ListenerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Subscription,
    Dispatch,
    Event,
    Configuration,
}

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("subscription error: {0}")]
    Subscription(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to send invalidation to {url}")]
    DispatchTransport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalidation endpoint {url} returned HTTP {status}")]
    DispatchStatus { url: String, status: u16 },

    #[error("invalidation dispatch timed out after {0:?}")]
    DispatchTimeout(Duration),

    #[error("invalid change event: {0}")]
    InvalidEvent(#[from] revalidate_core::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ListenerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ListenerError::Subscription(_) | ListenerError::Postgres(_) => ErrorKind::Subscription,
            ListenerError::DispatchTransport { .. }
            | ListenerError::DispatchStatus { .. }
            | ListenerError::DispatchTimeout(_) => ErrorKind::Dispatch,
            ListenerError::InvalidEvent(_) => ErrorKind::Event,
            ListenerError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Only configuration errors stop the process; everything else is
    /// handled per event or per subscription.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error() {
        let err = ListenerError::Subscription("connection reset".to_string());
        assert_eq!(err.to_string(), "subscription error: connection reset");
        assert_eq!(err.kind(), ErrorKind::Subscription);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_dispatch_status_error() {
        let err = ListenerError::DispatchStatus {
            url: "http://cache/api/invalidate".to_string(),
            status: 503,
        };
        assert_eq!(
            err.to_string(),
            "invalidation endpoint http://cache/api/invalidate returned HTTP 503"
        );
        assert_eq!(err.kind(), ErrorKind::Dispatch);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_dispatch_timeout_error() {
        let err = ListenerError::DispatchTimeout(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
        assert_eq!(err.kind(), ErrorKind::Dispatch);
    }

    #[test]
    fn test_invalid_event_from_core() {
        let core_err = revalidate_core::Error::InvalidCacheKey("cache key cannot be empty".into());
        let err = ListenerError::from(core_err);
        assert_eq!(err.kind(), ErrorKind::Event);
        assert!(err.to_string().contains("cache key cannot be empty"));
    }

    #[test]
    fn test_config_error_is_fatal() {
        let err = ListenerError::Config("count threshold must be at least 1".to_string());
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.is_fatal());
    }
}
