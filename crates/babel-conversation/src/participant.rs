//! Participant value type.

use serde::{Deserialize, Serialize};

/// A member of a conversation room.
///
/// Copies of this type cross component boundaries; the roster owns the
/// authoritative entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub nickname: String,
    /// Color code, e.g. "#FF5733".
    pub avatar: String,
    pub locale: String,
    pub is_host: bool,
    pub is_muted: bool,
    pub uses_tts: bool,
}

impl Participant {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            ..Self::default()
        }
    }
}

/// Why a `ParticipantsChanged` notification was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantChangedReason {
    JoinedConversation,
    LeftConversation,
    Updated,
}
