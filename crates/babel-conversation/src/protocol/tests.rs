use chrono::{Datelike, Timelike};
use serde_json::json;

use super::*;

fn frame(value: serde_json::Value) -> String {
    value.to_string()
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[test]
fn decodes_participant_list() {
    let text = frame(json!({
        "type": "info",
        "command": "ParticipantList",
        "roomid": "ABCDE",
        "token": "t",
        "participants": [
            {
                "nickname": "Ana", "participantId": "p1", "avatar": "#FF0000",
                "locale": "en-US", "ishost": true, "ismuted": false, "usetts": false
            },
            {
                "nickname": "Ben", "participantId": "p2", "avatar": "#00FF00",
                "locale": "de-DE", "ishost": false, "ismuted": true, "usetts": true
            }
        ]
    }));

    let Message::ParticipantList(list) = decode(&text).unwrap() else {
        panic!("expected participant list");
    };
    assert_eq!(list.command, "participantlist");
    assert_eq!(list.room_id.as_deref(), Some("ABCDE"));
    assert_eq!(list.participants.len(), 2);
    assert!(list.participants[0].is_host);
    assert_eq!(list.participants[1].locale, "de-DE");
    assert!(list.participants[1].is_muted);
    assert!(list.participants[1].uses_tts);
}

#[test]
fn participant_list_entries_need_every_field() {
    let text = frame(json!({
        "type": "info",
        "command": "participantlist",
        "participants": [{ "nickname": "Ana", "participantId": "p1" }]
    }));
    assert!(matches!(decode(&text), Err(DecodeError::Invalid { .. })));
    assert!(parse_message(&text).is_none());
}

#[test]
fn decodes_token_refresh() {
    let text = frame(json!({
        "type": "info",
        "command": "Token",
        "token": "speech-token",
        "region": "westus",
        "validTo": "2026-03-01T12:30:00Z"
    }));

    let Message::AuthorizationToken(token) = decode(&text).unwrap() else {
        panic!("expected token");
    };
    assert_eq!(token.token, "speech-token");
    assert_eq!(token.region, "westus");
    let until = token.valid_until.unwrap();
    assert_eq!((until.year(), until.month(), until.day()), (2026, 3, 1));
    assert_eq!((until.hour(), until.minute()), (12, 30));
}

#[test]
fn token_refresh_with_bad_expiry_is_rejected() {
    let text = frame(json!({
        "type": "info", "command": "token", "token": "t", "region": "r",
        "validTo": "tomorrow"
    }));
    assert!(decode(&text).is_err());
}

#[test]
fn decodes_join_session() {
    let text = frame(json!({
        "type": "command", "command": "JoinSession",
        "roomid": "ABCDE", "nickname": "Cy", "participantId": "p3",
        "ishost": false, "ismuted": false, "locale": "fr-FR", "usetts": true
    }));

    let Message::Command(cmd) = decode(&text).unwrap() else {
        panic!("expected command");
    };
    assert_eq!(cmd.command, SessionCommand::JoinSession);
    assert_eq!(cmd.sender.participant_id, "p3");
    assert_eq!(cmd.sender.avatar, "");
    assert_eq!(cmd.locale.as_deref(), Some("fr-FR"));
    assert_eq!(cmd.uses_tts, Some(true));
}

#[test]
fn join_session_requires_participant_details() {
    let text = frame(json!({
        "type": "command", "command": "JoinSession",
        "roomid": "ABCDE", "nickname": "Cy", "participantId": "p3",
        "ishost": false
    }));
    assert!(decode(&text).is_err());

    // LeaveSession does not need them.
    let text = frame(json!({
        "type": "command", "command": "LeaveSession",
        "roomid": "ABCDE", "nickname": "Cy", "participantId": "p3",
        "ishost": false
    }));
    assert!(decode(&text).is_ok());
}

#[test]
fn empty_room_id_is_rejected() {
    let text = frame(json!({
        "type": "command", "command": "LeaveSession",
        "roomid": "", "nickname": "Cy", "participantId": "p3", "ishost": false
    }));
    assert!(decode(&text).is_err());
}

#[test]
fn decodes_participant_command_values() {
    let mute = frame(json!({
        "type": "participant_command", "command": "SetMute", "value": true,
        "roomid": "R", "nickname": "Ben", "participantId": "p2"
    }));
    let Message::ParticipantCommand(cmd) = decode(&mute).unwrap() else {
        panic!("expected participant command");
    };
    assert_eq!(cmd.command, ParticipantCommandKind::SetMute);
    assert_eq!(cmd.value, CommandValue::Bool(true));

    let expiry = frame(json!({
        "type": "participant_command", "command": "RoomExpirationWarning", "value": 5,
        "roomid": "R", "nickname": "Ana", "participantId": "p1"
    }));
    let Message::ParticipantCommand(cmd) = decode(&expiry).unwrap() else {
        panic!("expected participant command");
    };
    assert_eq!(cmd.value, CommandValue::Integer(5));

    let nick = frame(json!({
        "type": "participant_command", "command": "ChangeNickname", "value": "Benny",
        "roomid": "R", "nickname": "Ben", "participantId": "p2"
    }));
    let Message::ParticipantCommand(cmd) = decode(&nick).unwrap() else {
        panic!("expected participant command");
    };
    assert_eq!(cmd.value, CommandValue::Text("Benny".into()));
}

#[test]
fn unknown_participant_command_is_rejected() {
    let text = frame(json!({
        "type": "participant_command", "command": "Dance", "value": true,
        "roomid": "R", "nickname": "Ben", "participantId": "p2"
    }));
    assert!(decode(&text).is_err());
}

#[test]
fn decodes_recognitions() {
    let text = frame(json!({
        "type": "final", "id": "u1", "timestamp": "2026-03-01T12:30:00Z",
        "language": "en-US", "recognition": "hello",
        "translations": [{ "lang": "de", "translation": "hallo" }],
        "roomid": "R", "nickname": "Ben", "participantId": "p2"
    }));
    let Message::Recognition(rec) = decode(&text).unwrap() else {
        panic!("expected recognition");
    };
    assert_eq!(rec.kind, RecognitionKind::Final);
    assert_eq!(rec.recognition, "hello");
    assert_eq!(
        rec.translations,
        vec![Translation {
            language: "de".into(),
            text: "hallo".into()
        }]
    );
}

#[test]
fn decodes_translated_message() {
    let text = frame(json!({
        "type": "translated_message", "id": "m1", "timestamp": "t",
        "language": "en-US", "originalText": "hi there",
        "translations": [],
        "roomid": "R", "nickname": "Ben", "participantId": "p2"
    }));
    let Message::InstantMessage(msg) = decode(&text).unwrap() else {
        panic!("expected instant message");
    };
    assert_eq!(msg.original_text, "hi there");
    assert!(msg.translations.is_empty());
}

#[test]
fn rejects_unusable_frames() {
    assert!(matches!(decode("not json"), Err(DecodeError::Json(_))));
    assert!(matches!(decode("[1,2]"), Err(DecodeError::Json(_))));
    assert!(matches!(decode("{}"), Err(DecodeError::MissingType)));
    assert!(matches!(
        decode(r#"{"type":"weather"}"#),
        Err(DecodeError::UnknownType(_))
    ));
    assert!(matches!(
        decode(r#"{"type":"instant_message","text":"x"}"#),
        Err(DecodeError::Unexpected(_))
    ));
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

fn sender() -> SenderInfo {
    SenderInfo {
        room_id: "ABCDE".into(),
        nickname: "Ana".into(),
        participant_id: "p1".into(),
        avatar: String::new(),
    }
}

#[test]
fn participant_command_envelope() {
    let msg = OutboundMessage::ParticipantCommand {
        sender: sender(),
        command: ParticipantCommandKind::SetUseTts,
        value: CommandValue::Bool(true),
    };
    let json = msg.to_json().unwrap();
    assert_eq!(
        json,
        r#"{"type":"participant_command","roomid":"ABCDE","nickname":"Ana","participantId":"p1","command":"SetUseTTS","value":true}"#
    );
}

#[test]
fn instant_message_envelope_includes_avatar_when_set() {
    let mut from = sender();
    from.avatar = "#123456".into();
    let msg = OutboundMessage::InstantMessage {
        sender: from,
        text: "hello".into(),
    };
    let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(value["type"], "instant_message");
    assert_eq!(value["avatar"], "#123456");
    assert_eq!(value["text"], "hello");
    assert!(value.get("command").is_none());
}

#[test]
fn authorization_token_envelope() {
    let msg = OutboundMessage::AuthorizationToken {
        room_id: "ABCDE".into(),
        token: "secret".into(),
        region: "westus".into(),
    };
    let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(value["type"], "info");
    assert_eq!(value["command"], "token");
    assert_eq!(value["token"], "secret");
    assert_eq!(value["region"], "westus");
    assert!(value.get("nickname").is_none());

    assert!(!format!("{msg:?}").contains("secret"));
}

#[test]
fn outbound_commands_decode_as_inbound() {
    let msg = OutboundMessage::ParticipantCommand {
        sender: sender(),
        command: ParticipantCommandKind::ChangeNickname,
        value: CommandValue::Text("Anya".into()),
    };
    let Message::ParticipantCommand(cmd) = decode(&msg.to_json().unwrap()).unwrap() else {
        panic!("expected participant command");
    };
    assert_eq!(cmd.sender, sender());
    assert_eq!(cmd.value, CommandValue::Text("Anya".into()));
}
