use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid cache key: {0}")]
    InvalidCacheKey(String),

    #[error("invalid invalidation tag: {0}")]
    InvalidTag(String),

    #[error("invalid tag rule: {0}")]
    InvalidTagRule(String),
}
