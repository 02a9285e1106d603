use babel_common::{BabelError, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("timed out waiting for the participants list")]
    Timeout,

    #[error("connect aborted: {0}")]
    Aborted(String),

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        code: ErrorCode,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    #[error("transport error ({code}): {message}")]
    Transport { code: ErrorCode, message: String },

    #[error("recognizer error ({code}): {message}")]
    Recognizer { code: ErrorCode, message: String },

    #[error("{0} is no longer running")]
    ActorStopped(&'static str),
}

impl ConversationError {
    /// Normalized taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout => ErrorCode::Timeout,
            Self::Aborted(_) | Self::Network(_) => ErrorCode::ConnectionError,
            Self::Http { code, .. } | Self::Transport { code, .. } | Self::Recognizer { code, .. } => {
                *code
            }
            Self::InvalidArgument(_)
            | Self::InvalidState(_)
            | Self::NotPermitted(_)
            | Self::MalformedResponse(_)
            | Self::ActorStopped(_) => ErrorCode::RuntimeError,
        }
    }

    /// Precondition violations: wrong state, missing privilege or a bad
    /// argument. These never have side effects.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidState(_) | Self::NotPermitted(_)
        )
    }
}

impl From<ConversationError> for BabelError {
    fn from(err: ConversationError) -> Self {
        BabelError::Conversation {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
