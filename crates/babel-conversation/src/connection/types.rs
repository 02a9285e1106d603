//! Types for the conversation connection.

use std::time::Duration;

use babel_common::ErrorCode;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::error::ConversationError;
use crate::participant::{Participant, ParticipantChangedReason};
use crate::protocol::{InstantMessage, RecognitionMessage};
use crate::transport::DisconnectReason;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Streaming endpoint, e.g. `wss://dev.microsofttranslator.com/capito/translate`.
    pub endpoint: String,
    /// Upper bound on waiting for the participants list after connecting.
    pub connect_timeout: Duration,
    /// Sent as `X-ClientTraceId`. A fresh id is generated when unset.
    pub correlation_id: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: Duration::from_secs(90),
            correlation_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events delivered to the connection's owner.
#[derive(Clone)]
pub enum ConnectionEvent {
    /// The participants list has arrived; commands may now be sent.
    Connected,
    Disconnected {
        reason: DisconnectReason,
        message: String,
        server_requested: bool,
    },
    SpeechRecognition(RecognitionMessage),
    InstantMessage(InstantMessage),
    ParticipantChanged {
        reason: ParticipantChangedReason,
        participants: Vec<Participant>,
    },
    RoomExpirationWarning {
        minutes_left: i64,
    },
    RoomLockChanged {
        locked: bool,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    AuthorizationTokenUpdated {
        token: String,
        region: String,
        valid_until: Option<DateTime<Utc>>,
    },
}

impl std::fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected {
                reason,
                message,
                server_requested,
            } => f
                .debug_struct("Disconnected")
                .field("reason", reason)
                .field("message", message)
                .field("server_requested", server_requested)
                .finish(),
            Self::SpeechRecognition(m) => f.debug_tuple("SpeechRecognition").field(m).finish(),
            Self::InstantMessage(m) => f.debug_tuple("InstantMessage").field(m).finish(),
            Self::ParticipantChanged {
                reason,
                participants,
            } => f
                .debug_struct("ParticipantChanged")
                .field("reason", reason)
                .field("participants", participants)
                .finish(),
            Self::RoomExpirationWarning { minutes_left } => f
                .debug_struct("RoomExpirationWarning")
                .field("minutes_left", minutes_left)
                .finish(),
            Self::RoomLockChanged { locked } => f
                .debug_struct("RoomLockChanged")
                .field("locked", locked)
                .finish(),
            Self::Error { code, message } => f
                .debug_struct("Error")
                .field("code", code)
                .field("message", message)
                .finish(),
            Self::AuthorizationTokenUpdated {
                region,
                valid_until,
                ..
            } => f
                .debug_struct("AuthorizationTokenUpdated")
                .field("token", &"[REDACTED]")
                .field("region", region)
                .field("valid_until", valid_until)
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Actor commands
// ---------------------------------------------------------------------------

pub(super) type Reply<T> = oneshot::Sender<Result<T, ConversationError>>;

/// Outbound operations. Each one is checked against the readiness gate
/// before anything is sent.
#[derive(Debug)]
pub(super) enum Request {
    Text(String),
    TtsEnabled(bool),
    Nickname(String),
    RoomLocked(bool),
    MuteEveryoneElse(bool),
    MuteParticipant { participant_id: String, muted: bool },
    Eject { participant_id: String },
    AuthorizationToken { token: String, region: String },
}

impl Request {
    pub(super) fn host_only(&self) -> bool {
        matches!(
            self,
            Self::RoomLocked(_)
                | Self::MuteEveryoneElse(_)
                | Self::MuteParticipant { .. }
                | Self::Eject { .. }
                | Self::AuthorizationToken { .. }
        )
    }
}

pub(super) enum Command {
    Connect {
        participant_id: String,
        session_token: String,
        reply: Reply<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        request: Request,
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Point-in-time copy of the connection's state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Transport connected and participants list received.
    pub ready: bool,
    pub room_id: Option<String>,
    pub participant_id: String,
    pub muted_by_host: bool,
    pub participants: Vec<Participant>,
}

impl Snapshot {
    pub fn me(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.id == self.participant_id)
    }
}
