//! Local participant defaults used when creating or joining a room.

use serde::{Deserialize, Serialize};

/// Audio format requested for text-to-speech output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TtsFormat {
    #[default]
    Wav,
    WavSiren,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantConfig {
    pub nickname: String,
    /// Spoken language, e.g. "en-US".
    pub language: String,
    /// Languages other participants' speech is translated into for us.
    pub translate_to: Vec<String>,
    pub tts_voice: Option<String>,
    pub tts_format: TtsFormat,
    /// Delete the room when leaving (host only).
    pub end_on_leave: bool,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            language: "en-US".into(),
            translate_to: Vec::new(),
            tts_voice: None,
            tts_format: TtsFormat::Wav,
            end_on_leave: false,
        }
    }
}
