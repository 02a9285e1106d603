//! Outbound command envelopes.

use serde::Serialize;

use super::messages::{CommandValue, ParticipantCommandKind, SenderInfo};

/// A message this client sends to the room.
#[derive(Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    ParticipantCommand {
        sender: SenderInfo,
        command: ParticipantCommandKind,
        value: CommandValue,
    },
    InstantMessage {
        sender: SenderInfo,
        text: String,
    },
    /// Host pushing fresh speech credentials to the rest of the room.
    AuthorizationToken {
        room_id: String,
        token: String,
        region: String,
    },
}

impl std::fmt::Debug for OutboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParticipantCommand {
                sender,
                command,
                value,
            } => f
                .debug_struct("ParticipantCommand")
                .field("sender", sender)
                .field("command", command)
                .field("value", value)
                .finish(),
            Self::InstantMessage { sender, text } => f
                .debug_struct("InstantMessage")
                .field("sender", sender)
                .field("text_len", &text.len())
                .finish(),
            Self::AuthorizationToken {
                room_id, region, ..
            } => f
                .debug_struct("AuthorizationToken")
                .field("room_id", room_id)
                .field("token", &"[REDACTED]")
                .field("region", region)
                .finish(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(rename = "roomid", skip_serializing_if = "is_empty")]
    room_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<&'a str>,
    #[serde(rename = "participantId", skip_serializing_if = "Option::is_none")]
    participant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    avatar: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a CommandValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

fn is_empty(s: &&str) -> bool {
    s.is_empty()
}

impl<'a> Envelope<'a> {
    fn from_sender(kind: &'a str, sender: &'a SenderInfo) -> Self {
        Self {
            kind,
            room_id: &sender.room_id,
            nickname: Some(&sender.nickname),
            participant_id: Some(&sender.participant_id),
            avatar: &sender.avatar,
            command: None,
            value: None,
            text: None,
            token: None,
            region: None,
        }
    }
}

impl OutboundMessage {
    /// Serialize to the JSON text frame sent over the transport.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let envelope = match self {
            Self::ParticipantCommand {
                sender,
                command,
                value,
            } => Envelope {
                command: Some(command.as_str()),
                value: Some(value),
                ..Envelope::from_sender("participant_command", sender)
            },
            Self::InstantMessage { sender, text } => Envelope {
                text: Some(text),
                ..Envelope::from_sender("instant_message", sender)
            },
            Self::AuthorizationToken {
                room_id,
                token,
                region,
            } => Envelope {
                kind: "info",
                room_id,
                nickname: None,
                participant_id: None,
                avatar: "",
                command: Some("token"),
                value: None,
                text: None,
                token: Some(token),
                region: Some(region),
            },
        };
        serde_json::to_string(&envelope)
    }
}
