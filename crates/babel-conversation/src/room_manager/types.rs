//! Request and response types for the room REST API.

use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RoomManagerConfig {
    /// REST endpoint, e.g. `https://dev.microsofttranslator.com/capito/room`.
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for RoomManagerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Create / join arguments
// ---------------------------------------------------------------------------

/// Audio format for text-to-speech output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsFormat {
    #[default]
    Wav,
    WavSiren,
}

impl TtsFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::WavSiren => "audio/wav-siren",
        }
    }
}

/// Everything needed to create a room, or join one by code.
#[derive(Clone, Default)]
pub struct CreateConversationArgs {
    /// Speech service region. Required when creating a room.
    pub region: Option<String>,
    pub auth_token: Option<String>,
    pub subscription_key: Option<String>,
    /// Speech language of this participant, e.g. "en-US".
    pub language: String,
    pub nickname: String,
    pub translate_to: Vec<String>,
    /// Voice name. Setting it requests text-to-speech output.
    pub tts_voice: Option<String>,
    pub tts_format: TtsFormat,
    pub client_app_id: Option<String>,
    /// Host code used when no room pin is given.
    pub host_code: Option<String>,
    pub correlation_id: Option<String>,
}

impl std::fmt::Debug for CreateConversationArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateConversationArgs")
            .field("region", &self.region)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "subscription_key",
                &self.subscription_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("language", &self.language)
            .field("nickname", &self.nickname)
            .field("translate_to", &self.translate_to)
            .field("tts_voice", &self.tts_voice)
            .field("tts_format", &self.tts_format)
            .field("client_app_id", &self.client_app_id)
            .field("host_code", &self.host_code.as_ref().map(|_| "[REDACTED]"))
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Credentials and identity returned by create/join.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversationArgs {
    pub room_code: String,
    pub session_token: String,
    pub participant_id: String,
    pub speech_auth_token: String,
    pub speech_region: String,
    pub correlation_id: String,
    pub avatar: String,
    pub is_approved: bool,
    pub is_muted: bool,
}

impl std::fmt::Debug for ConversationArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationArgs")
            .field("room_code", &self.room_code)
            .field("session_token", &"[REDACTED]")
            .field("participant_id", &self.participant_id)
            .field("speech_auth_token", &"[REDACTED]")
            .field("speech_region", &self.speech_region)
            .field("correlation_id", &self.correlation_id)
            .field("avatar", &self.avatar)
            .field("is_approved", &self.is_approved)
            .field("is_muted", &self.is_muted)
            .finish()
    }
}

/// Wire shape of a successful create/join. Every field is required.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RoomResponse {
    pub avatar: String,
    pub cognitive_speech_auth_token: String,
    pub cognitive_speech_region: String,
    pub correlation_id: String,
    pub is_approved: bool,
    pub is_muted: bool,
    pub room_id: String,
    pub token: String,
    pub participant_id: String,
}

impl From<RoomResponse> for ConversationArgs {
    fn from(r: RoomResponse) -> Self {
        Self {
            room_code: r.room_id,
            session_token: r.token,
            participant_id: r.participant_id,
            speech_auth_token: r.cognitive_speech_auth_token,
            speech_region: r.cognitive_speech_region,
            correlation_id: r.correlation_id,
            avatar: r.avatar,
            is_approved: r.is_approved,
            is_muted: r.is_muted,
        }
    }
}
