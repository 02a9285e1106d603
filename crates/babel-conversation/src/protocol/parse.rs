//! Inbound frame decoding.
//!
//! The `type` field selects the variant; the rest of the frame must then
//! match that variant's shape exactly. Anything else is rejected without
//! side effects.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::messages::{
    AuthorizationTokenMessage, CommandMessage, CommandValue, InstantMessage, Message,
    ParticipantCommandKind, ParticipantCommandMessage, ParticipantListMessage, RecognitionKind,
    RecognitionMessage, SenderInfo, SessionCommand, Translation,
};
use crate::participant::Participant;

/// Format of `validTo` on token refresh messages.
const VALID_TO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a JSON object: {0}")]
    Json(String),

    #[error("frame has no type")]
    MissingType,

    #[error("unknown message type {0:?}")]
    UnknownType(String),

    #[error("{0} messages are not sent by the service")]
    Unexpected(&'static str),

    #[error("invalid {kind} message: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawSender {
    #[serde(rename = "roomid")]
    room_id: String,
    nickname: String,
    #[serde(rename = "participantId")]
    participant_id: String,
    #[serde(default)]
    avatar: String,
}

#[derive(Deserialize)]
struct RawInfo {
    command: String,
    #[serde(rename = "roomid", default)]
    room_id: Option<String>,
}

#[derive(Deserialize)]
struct RawToken {
    token: String,
    region: String,
    #[serde(rename = "validTo", default)]
    valid_to: Option<String>,
}

#[derive(Deserialize)]
struct RawParticipant {
    nickname: String,
    #[serde(rename = "participantId")]
    participant_id: String,
    avatar: String,
    locale: String,
    #[serde(rename = "ishost")]
    is_host: bool,
    #[serde(rename = "ismuted")]
    is_muted: bool,
    #[serde(rename = "usetts")]
    uses_tts: bool,
}

#[derive(Deserialize)]
struct RawParticipantList {
    participants: Vec<RawParticipant>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(flatten)]
    sender: RawSender,
    command: String,
    #[serde(rename = "ishost")]
    is_host: bool,
    #[serde(rename = "ismuted", default)]
    is_muted: Option<bool>,
    #[serde(default)]
    locale: Option<String>,
    #[serde(rename = "usetts", default)]
    uses_tts: Option<bool>,
}

#[derive(Deserialize)]
struct RawParticipantCommand {
    #[serde(flatten)]
    sender: RawSender,
    command: String,
    value: CommandValue,
}

#[derive(Deserialize)]
struct RawTranslation {
    lang: String,
    translation: String,
}

#[derive(Deserialize)]
struct RawRecognition {
    #[serde(flatten)]
    sender: RawSender,
    id: String,
    timestamp: String,
    language: String,
    translations: Vec<RawTranslation>,
    recognition: String,
}

#[derive(Deserialize)]
struct RawInstantMessage {
    #[serde(flatten)]
    sender: RawSender,
    id: String,
    timestamp: String,
    language: String,
    translations: Vec<RawTranslation>,
    #[serde(rename = "originalText")]
    original_text: String,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one inbound text frame, logging and returning `None` when the
/// frame is not a message this client understands.
pub fn parse_message(text: &str) -> Option<Message> {
    match decode(text) {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(error = %e, len = text.len(), "Dropping inbound frame");
            None
        }
    }
}

pub fn decode(text: &str) -> Result<Message, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::Json("top-level value is not an object".into()));
    }

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(DecodeError::MissingType)?
        .to_string();

    match kind.as_str() {
        "info" => decode_info(value),
        "command" => decode_command(value),
        "participant_command" => decode_participant_command(value),
        "partial" => decode_recognition(value, RecognitionKind::Partial),
        "final" => decode_recognition(value, RecognitionKind::Final),
        "translated_message" => decode_instant_message(value),
        "instant_message" => Err(DecodeError::Unexpected("instant_message")),
        _ => Err(DecodeError::UnknownType(kind)),
    }
}

fn decode_info(value: serde_json::Value) -> Result<Message, DecodeError> {
    let info: RawInfo = shape(&value, "info")?;
    let command = info.command.to_lowercase();

    if command == "token" {
        let raw: RawToken = shape(&value, "token")?;
        let valid_until = raw
            .valid_to
            .as_deref()
            .map(parse_valid_to)
            .transpose()?;
        return Ok(Message::AuthorizationToken(AuthorizationTokenMessage {
            room_id: info.room_id,
            token: raw.token,
            region: raw.region,
            valid_until,
        }));
    }

    let raw: RawParticipantList = shape(&value, "participant list")?;
    Ok(Message::ParticipantList(ParticipantListMessage {
        room_id: info.room_id,
        command,
        participants: raw
            .participants
            .into_iter()
            .map(|p| Participant {
                id: p.participant_id,
                nickname: p.nickname,
                avatar: p.avatar,
                locale: p.locale,
                is_host: p.is_host,
                is_muted: p.is_muted,
                uses_tts: p.uses_tts,
            })
            .collect(),
        token: raw.token,
    }))
}

fn decode_command(value: serde_json::Value) -> Result<Message, DecodeError> {
    const KIND: &str = "command";
    let raw: RawCommand = shape(&value, KIND)?;
    let command = SessionCommand::parse(&raw.command).ok_or_else(|| DecodeError::Invalid {
        kind: KIND,
        reason: format!("unknown command {:?}", raw.command),
    })?;

    if command == SessionCommand::JoinSession
        && (raw.is_muted.is_none() || raw.locale.is_none() || raw.uses_tts.is_none())
    {
        return Err(DecodeError::Invalid {
            kind: KIND,
            reason: "JoinSession requires ismuted, locale and usetts".into(),
        });
    }

    Ok(Message::Command(CommandMessage {
        sender: sender(raw.sender, KIND)?,
        command,
        is_host: raw.is_host,
        is_muted: raw.is_muted,
        locale: raw.locale,
        uses_tts: raw.uses_tts,
    }))
}

fn decode_participant_command(value: serde_json::Value) -> Result<Message, DecodeError> {
    const KIND: &str = "participant_command";
    let raw: RawParticipantCommand = shape(&value, KIND)?;
    let command =
        ParticipantCommandKind::parse(&raw.command).ok_or_else(|| DecodeError::Invalid {
            kind: KIND,
            reason: format!("unknown command {:?}", raw.command),
        })?;

    Ok(Message::ParticipantCommand(ParticipantCommandMessage {
        sender: sender(raw.sender, KIND)?,
        command,
        value: raw.value,
    }))
}

fn decode_recognition(
    value: serde_json::Value,
    kind: RecognitionKind,
) -> Result<Message, DecodeError> {
    const KIND: &str = "recognition";
    let raw: RawRecognition = shape(&value, KIND)?;
    Ok(Message::Recognition(RecognitionMessage {
        kind,
        sender: sender(raw.sender, KIND)?,
        id: raw.id,
        timestamp: raw.timestamp,
        language: raw.language,
        translations: translations(raw.translations),
        recognition: raw.recognition,
    }))
}

fn decode_instant_message(value: serde_json::Value) -> Result<Message, DecodeError> {
    const KIND: &str = "translated_message";
    let raw: RawInstantMessage = shape(&value, KIND)?;
    Ok(Message::InstantMessage(InstantMessage {
        sender: sender(raw.sender, KIND)?,
        id: raw.id,
        timestamp: raw.timestamp,
        language: raw.language,
        translations: translations(raw.translations),
        original_text: raw.original_text,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn shape<T: DeserializeOwned>(value: &serde_json::Value, kind: &'static str) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|e| DecodeError::Invalid {
        kind,
        reason: e.to_string(),
    })
}

fn sender(raw: RawSender, kind: &'static str) -> Result<SenderInfo, DecodeError> {
    if raw.room_id.is_empty() {
        return Err(DecodeError::Invalid {
            kind,
            reason: "roomid is empty".into(),
        });
    }
    Ok(SenderInfo {
        room_id: raw.room_id,
        nickname: raw.nickname,
        participant_id: raw.participant_id,
        avatar: raw.avatar,
    })
}

fn translations(raw: Vec<RawTranslation>) -> Vec<Translation> {
    raw.into_iter()
        .map(|t| Translation {
            language: t.lang,
            text: t.translation,
        })
        .collect()
}

fn parse_valid_to(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    NaiveDateTime::parse_from_str(s, VALID_TO_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| DecodeError::Invalid {
            kind: "token",
            reason: format!("validTo {s:?}: {e}"),
        })
}
