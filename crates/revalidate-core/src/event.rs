use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Largest payload PostgreSQL accepts for a single `NOTIFY`.
pub const MAX_CACHE_KEY_LEN: usize = 8000;

/// A single change notification, identified by the opaque cache key the data
/// store attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChangeEvent {
    cache_key: String,
}

impl ChangeEvent {
    /// The key is kept byte for byte. An empty key is valid: a bare `NOTIFY`
    /// carries no payload and still reports a change.
    pub fn new(cache_key: impl Into<String>) -> Result<Self> {
        let cache_key = cache_key.into();
        Self::validate(&cache_key)?;
        Ok(Self { cache_key })
    }

    /// Builds an event from a raw notification payload.
    pub fn from_payload(payload: &str) -> Result<Self> {
        Self::new(payload)
    }

    fn validate(key: &str) -> Result<()> {
        if key.len() > MAX_CACHE_KEY_LEN {
            return Err(Error::InvalidCacheKey(format!(
                "cache key is {} bytes, max {}",
                key.len(),
                MAX_CACHE_KEY_LEN
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cache_key.is_empty()
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn into_cache_key(self) -> String {
        self.cache_key
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key)
    }
}

impl FromStr for ChangeEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
