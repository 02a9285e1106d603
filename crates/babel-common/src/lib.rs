pub mod errors;
pub mod id;

pub use errors::{BabelError, ConfigError, ErrorCode};
pub use id::{new_correlation_id, new_id, new_utterance_id, SessionId};

pub type Result<T> = std::result::Result<T, BabelError>;
