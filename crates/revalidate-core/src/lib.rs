pub mod error;
pub mod event;
pub mod tag;

pub use error::{Error, Result};
pub use event::{ChangeEvent, MAX_CACHE_KEY_LEN};
pub use tag::{InvalidationTag, TagMapping, TagRule};
