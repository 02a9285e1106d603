//! Transport states, events and error mapping.

use babel_common::ErrorCode;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Initial,
    Opening,
    Connected,
    Closed,
    Destroying,
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// URL plus request headers for the upgrade request.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Append a percent-encoded query parameter, respecting any existing
    /// query string.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        self.url = format!(
            "{}{sep}{}={}",
            self.url,
            urlencoding::encode(key),
            urlencoding::encode(value)
        );
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("headers", &names)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Disconnect reasons
// ---------------------------------------------------------------------------

/// Close reason reported when the socket goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Unknown,
    Normal,
    EndpointUnavailable,
    ProtocolError,
    CannotAcceptDataType,
    InvalidPayloadData,
    PolicyViolation,
    MessageTooBig,
    UnexpectedCondition,
    InternalServerError,
}

impl DisconnectReason {
    /// Map an RFC 6455 close code.
    pub fn from_close_code(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::EndpointUnavailable,
            1002 => Self::ProtocolError,
            1003 => Self::CannotAcceptDataType,
            1007 => Self::InvalidPayloadData,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1010 => Self::UnexpectedCondition,
            1011 => Self::InternalServerError,
            _ => Self::Unknown,
        }
    }

    /// `None` for a clean close.
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            Self::Normal => None,
            Self::Unknown => Some(ErrorCode::RuntimeError),
            Self::EndpointUnavailable => Some(ErrorCode::ServiceUnavailable),
            Self::InternalServerError => Some(ErrorCode::ServiceError),
            Self::ProtocolError
            | Self::CannotAcceptDataType
            | Self::InvalidPayloadData
            | Self::PolicyViolation
            | Self::MessageTooBig
            | Self::UnexpectedCondition => Some(ErrorCode::BadRequest),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    RemoteClosed,
    ConnectionFailure,
    /// The server refused the WebSocket upgrade with this HTTP status.
    UpgradeRejected(u16),
    SendFrame,
    WebSocket,
    DnsFailure,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self.kind {
            TransportErrorKind::UpgradeRejected(status) => ErrorCode::from_http_status(status),
            _ => ErrorCode::ConnectionError,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Disconnected {
        reason: DisconnectReason,
        message: String,
        /// The server initiated the close.
        server_requested: bool,
    },
    Text(String),
    Binary(Vec<u8>),
    Error(TransportError),
}
