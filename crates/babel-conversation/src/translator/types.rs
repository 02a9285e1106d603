//! Session coordinator states, results and events.

use std::time::Duration;

use babel_common::{ErrorCode, SessionId};
use tokio::sync::{mpsc, oneshot};

use crate::connection::{ConnectionEvent, ConversationConnection};
use crate::error::ConversationError;
use crate::participant::{Participant, ParticipantChangedReason};
use crate::protocol::Translation;
use crate::room_manager::ConversationArgs;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Closed,
    Opening,
    /// Joined, but the room connection and the recognizer are not both up.
    PartiallyOpen,
    Open,
    Closing,
    Failed,
}

impl ConversationState {
    /// States in which session operations are accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::PartiallyOpen | Self::Open)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    Error,
    EndOfStream,
    CanceledByUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDetails {
    pub reason: CancellationReason,
    pub code: Option<ErrorCode>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    /// Local speech, intermediate.
    TranslatingSpeech,
    /// Local speech, final.
    TranslatedSpeech,
    TranslatingParticipantSpeech,
    TranslatedParticipantSpeech,
    /// Echo of a message this participant sent.
    TranslatedInstantMessage,
    TranslatedParticipantInstantMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationResult {
    pub id: String,
    pub reason: ResultReason,
    pub participant_id: String,
    pub text: String,
    pub language: String,
    pub translations: Vec<Translation>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatorEvent {
    SessionStarted { session_id: SessionId },
    SessionStopped { session_id: SessionId },
    /// Both the room connection and the recognizer are up.
    Connected,
    Disconnected,
    Canceled { details: CancellationDetails },
    ParticipantsChanged {
        reason: ParticipantChangedReason,
        participants: Vec<Participant>,
    },
    Transcribing { result: ConversationResult },
    Transcribed { result: ConversationResult },
    TextMessageReceived { result: ConversationResult },
    ConversationExpiration { minutes_left: i64 },
    RoomLockChanged { locked: bool },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Upper bound on waiting for both sides to confirm they stopped.
    pub leave_timeout: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            leave_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything a join needs from the conversation owner.
pub struct JoinRequest {
    pub connection: ConversationConnection,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
    pub args: ConversationArgs,
    /// Speech language for the local recognizer.
    pub language: String,
    pub translate_to: Vec<String>,
    /// A clean close requested by the service ends the session.
    pub end_on_leave: bool,
}

impl std::fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinRequest")
            .field("args", &self.args)
            .field("language", &self.language)
            .field("translate_to", &self.translate_to)
            .field("end_on_leave", &self.end_on_leave)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Actor commands
// ---------------------------------------------------------------------------

pub(super) type Reply<T> = oneshot::Sender<Result<T, ConversationError>>;

pub(super) enum Command {
    Join {
        request: Box<JoinRequest>,
        reply: Reply<()>,
    },
    StartTranscribing {
        reply: Reply<()>,
    },
    StopTranscribing {
        reply: Reply<()>,
    },
    Rejoin {
        reply: Reply<()>,
    },
    SendText {
        text: String,
        reply: Reply<()>,
    },
    SetAuthorizationToken {
        token: String,
        region: String,
        reply: Reply<()>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    State {
        reply: oneshot::Sender<ConversationState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
