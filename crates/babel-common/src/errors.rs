use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Normalized error vocabulary shared by the REST client, the streaming
/// connection and the session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthenticationError,
    BadRequest,
    Forbidden,
    TooManyRequests,
    ConnectionError,
    ServiceUnavailable,
    ServiceError,
    RuntimeError,
    Timeout,
    CanceledByUser,
}

impl ErrorCode {
    /// Map an HTTP status (REST response or WebSocket upgrade) to a code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 404 => Self::BadRequest,
            401 => Self::AuthenticationError,
            403 => Self::Forbidden,
            408 | 504 => Self::Timeout,
            429 => Self::TooManyRequests,
            503 => Self::ServiceUnavailable,
            500..=599 => Self::ServiceError,
            _ => Self::RuntimeError,
        }
    }

    /// Errors that retrying with the same credentials and arguments will
    /// not fix.
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            Self::AuthenticationError | Self::BadRequest | Self::Forbidden
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationError => "authentication error",
            Self::BadRequest => "bad request",
            Self::Forbidden => "forbidden",
            Self::TooManyRequests => "too many requests",
            Self::ConnectionError => "connection error",
            Self::ServiceUnavailable => "service unavailable",
            Self::ServiceError => "service error",
            Self::RuntimeError => "runtime error",
            Self::Timeout => "timeout",
            Self::CanceledByUser => "canceled by user",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BabelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("conversation error ({code}): {message}")]
    Conversation { code: ErrorCode, message: String },

    #[error("{0}")]
    Other(String),
}
