//! Typed conversation messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::participant::Participant;

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Room id and identity of the participant a message is from (or about).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderInfo {
    pub room_id: String,
    pub nickname: String,
    pub participant_id: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub language: String,
    pub text: String,
}

/// Value carried by a participant command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

// ---------------------------------------------------------------------------
// Command kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    JoinSession,
    LeaveSession,
    /// Always followed by `LeaveSession` from the service.
    DisconnectSession,
}

impl SessionCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JoinSession" => Some(Self::JoinSession),
            "LeaveSession" => Some(Self::LeaveSession),
            "DisconnectSession" => Some(Self::DisconnectSession),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantCommandKind {
    SetMute,
    SetMuteAll,
    SetUseTts,
    RoomExpirationWarning,
    SetLockState,
    EjectParticipant,
    Joined,
    Left,
    ChangeNickname,
}

impl ParticipantCommandKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SetMute" => Some(Self::SetMute),
            "SetMuteAll" => Some(Self::SetMuteAll),
            "SetUseTTS" => Some(Self::SetUseTts),
            "RoomExpirationWarning" => Some(Self::RoomExpirationWarning),
            "SetLockState" => Some(Self::SetLockState),
            "EjectParticipant" => Some(Self::EjectParticipant),
            "Joined" => Some(Self::Joined),
            "Left" => Some(Self::Left),
            "ChangeNickname" => Some(Self::ChangeNickname),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetMute => "SetMute",
            Self::SetMuteAll => "SetMuteAll",
            Self::SetUseTts => "SetUseTTS",
            Self::RoomExpirationWarning => "RoomExpirationWarning",
            Self::SetLockState => "SetLockState",
            Self::EjectParticipant => "EjectParticipant",
            Self::Joined => "Joined",
            Self::Left => "Left",
            Self::ChangeNickname => "ChangeNickname",
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Roster snapshot sent once the socket is open, and again whenever the
/// service decides to resend it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantListMessage {
    pub room_id: Option<String>,
    pub command: String,
    pub participants: Vec<Participant>,
    pub token: Option<String>,
}

/// Refreshed speech service credentials for the room.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationTokenMessage {
    pub room_id: Option<String>,
    pub token: String,
    pub region: String,
    pub valid_until: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AuthorizationTokenMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationTokenMessage")
            .field("room_id", &self.room_id)
            .field("token", &"[REDACTED]")
            .field("region", &self.region)
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

/// A participant joining or leaving the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub sender: SenderInfo,
    pub command: SessionCommand,
    pub is_host: bool,
    pub is_muted: Option<bool>,
    pub locale: Option<String>,
    pub uses_tts: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantCommandMessage {
    pub sender: SenderInfo,
    pub command: ParticipantCommandKind,
    pub value: CommandValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionKind {
    Partial,
    Final,
}

/// Another participant's speech, recognized and translated by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionMessage {
    pub kind: RecognitionKind,
    pub sender: SenderInfo,
    pub id: String,
    pub timestamp: String,
    pub language: String,
    pub translations: Vec<Translation>,
    pub recognition: String,
}

/// A typed message from a participant, with translations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantMessage {
    pub sender: SenderInfo,
    pub id: String,
    pub timestamp: String,
    pub language: String,
    pub translations: Vec<Translation>,
    pub original_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ParticipantList(ParticipantListMessage),
    AuthorizationToken(AuthorizationTokenMessage),
    Command(CommandMessage),
    ParticipantCommand(ParticipantCommandMessage),
    Recognition(RecognitionMessage),
    InstantMessage(InstantMessage),
}
