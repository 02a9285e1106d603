use std::sync::Arc;
use std::time::Duration;

use babel_common::ErrorCode;
use serde_json::json;
use tokio::sync::mpsc;

use super::*;
use crate::connection::{ConnectionConfig, ConversationConnection};
use crate::error::ConversationError;
use crate::participant::ParticipantChangedReason;
use crate::room_manager::ConversationArgs;
use crate::testing::{MockRecognizer, MockTransport};
use crate::transport::{DisconnectReason, TransportError, TransportErrorKind};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Harness {
    transport: Arc<MockTransport>,
    recognizer: Arc<MockRecognizer>,
    translator: ConversationTranslator,
    events: mpsc::Receiver<TranslatorEvent>,
}

fn args() -> ConversationArgs {
    ConversationArgs {
        room_code: "ROOM1".into(),
        session_token: "session-token".into(),
        participant_id: "p1".into(),
        speech_auth_token: "speech-token".into(),
        speech_region: "westus".into(),
        correlation_id: "corr-1".into(),
        avatar: "#111111".into(),
        is_approved: true,
        is_muted: false,
    }
}

fn participant_list() -> String {
    json!({
        "type": "info",
        "command": "participantlist",
        "roomid": "ROOM1",
        "participants": [
            {
                "nickname": "Me", "participantId": "p1", "avatar": "#111111",
                "locale": "en-US", "ishost": true, "ismuted": false, "usetts": false
            },
            {
                "nickname": "Ben", "participantId": "p2", "avatar": "#222222",
                "locale": "de-DE", "ishost": false, "ismuted": false, "usetts": false
            }
        ]
    })
    .to_string()
}

fn recognition(kind: &str, participant_id: &str, text: &str) -> String {
    json!({
        "type": kind, "id": "remote-1", "timestamp": "t", "language": "de-DE",
        "recognition": text, "translations": [{"lang": "en", "translation": "hello"}],
        "roomid": "ROOM1", "nickname": "Ben", "participantId": participant_id
    })
    .to_string()
}

fn setup(
    config: TranslatorConfig,
    end_on_leave: bool,
) -> (Harness, JoinRequest) {
    let transport = Arc::new(MockTransport::new());
    let recognizer = Arc::new(MockRecognizer::new());
    let (connection, connection_events) = ConversationConnection::new(
        transport.clone(),
        ConnectionConfig {
            endpoint: "wss://example.test/capito/translate".into(),
            connect_timeout: Duration::from_secs(5),
            correlation_id: None,
        },
    );
    let (translator, events) = ConversationTranslator::new(recognizer.clone(), config);
    let request = JoinRequest {
        connection,
        events: connection_events,
        args: args(),
        language: "en-US".into(),
        translate_to: vec!["de".into()],
        end_on_leave,
    };
    (
        Harness {
            transport,
            recognizer,
            translator,
            events,
        },
        request,
    )
}

/// Joined and `Open`, with the start-up events drained.
async fn joined_with(config: TranslatorConfig, end_on_leave: bool) -> Harness {
    let (mut h, request) = setup(config, end_on_leave);

    let joining = {
        let translator = h.translator.clone();
        tokio::spawn(async move { translator.join_with(request).await })
    };
    h.transport.wait_for_connect().await;
    h.transport.open();
    h.transport.push_text(participant_list());
    joining.await.unwrap().unwrap();

    let startup = drain(&mut h.events).await;
    assert!(
        matches!(startup.first(), Some(TranslatorEvent::SessionStarted { .. })),
        "{startup:?}"
    );
    assert_eq!(count(&startup, |e| matches!(e, TranslatorEvent::Connected)), 1);
    assert!(startup.iter().any(|e| matches!(
        e,
        TranslatorEvent::ParticipantsChanged {
            reason: ParticipantChangedReason::JoinedConversation,
            ..
        }
    )));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Open);
    h
}

async fn joined() -> Harness {
    joined_with(TranslatorConfig::default(), false).await
}

/// Every event delivered until the stream goes quiet.
async fn drain(rx: &mut mpsc::Receiver<TranslatorEvent>) -> Vec<TranslatorEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await
    {
        events.push(event);
    }
    events
}

fn count(events: &[TranslatorEvent], pred: impl Fn(&TranslatorEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

fn is_session_stopped(e: &TranslatorEvent) -> bool {
    matches!(e, TranslatorEvent::SessionStopped { .. })
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_configures_recognizer_and_opens() {
    let h = joined().await;

    let settings = h.recognizer.settings().unwrap();
    assert_eq!(settings.participant_id, "p1");
    assert_eq!(settings.conversation_token, "session-token");
    assert_eq!(settings.speech_auth_token, "speech-token");
    assert_eq!(settings.speech_region, "westus");
    assert_eq!(settings.language, "en-US");
    assert_eq!(settings.translate_to, vec!["de".to_string()]);
    assert_eq!(settings.room_code, "ROOM1");
    assert_eq!(h.recognizer.calls(), vec!["configure", "open_connection"]);
}

#[tokio::test]
async fn join_failure_returns_to_closed() {
    let (mut h, request) = setup(TranslatorConfig::default(), false);

    let joining = {
        let translator = h.translator.clone();
        tokio::spawn(async move { translator.join_with(request).await })
    };
    h.transport.wait_for_connect().await;
    h.transport.fail(TransportError::new(
        TransportErrorKind::UpgradeRejected(401),
        "unauthorized",
    ));

    let err = joining.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthenticationError);
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Closed);
    assert!(drain(&mut h.events).await.is_empty());
    assert!(!h.recognizer.calls().contains(&"open_connection"));
}

#[tokio::test]
async fn second_join_is_rejected() {
    let h = joined().await;
    let (_other, request) = setup(TranslatorConfig::default(), false);

    let err = h.translator.join_with(request).await.unwrap_err();

    assert!(matches!(err, ConversationError::InvalidState(_)));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Open);
}

#[tokio::test]
async fn operations_need_an_active_session() {
    let (h, _request) = setup(TranslatorConfig::default(), false);

    for err in [
        h.translator.start_transcribing().await.unwrap_err(),
        h.translator.stop_transcribing().await.unwrap_err(),
        h.translator.send_text_message("hi").await.unwrap_err(),
        h.translator.set_authorization_token("t", "r").await.unwrap_err(),
    ] {
        assert!(matches!(err, ConversationError::InvalidState(_)), "{err}");
    }
    assert!(h.recognizer.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_room_disconnect_goes_partially_open() {
    let mut h = joined().await;

    h.transport.close(DisconnectReason::Normal, true);

    let events = drain(&mut h.events).await;
    assert_eq!(events, vec![TranslatorEvent::Disconnected]);
    assert_eq!(
        h.translator.state().await.unwrap(),
        ConversationState::PartiallyOpen
    );
}

#[tokio::test]
async fn both_sides_down_closes_with_one_session_stopped() {
    let mut h = joined().await;

    h.recognizer.emit(RecognizerEvent::Disconnected);
    assert_eq!(drain(&mut h.events).await, vec![TranslatorEvent::Disconnected]);
    assert_eq!(
        h.translator.state().await.unwrap(),
        ConversationState::PartiallyOpen
    );

    h.transport.close(DisconnectReason::Normal, false);
    let events = drain(&mut h.events).await;
    assert_eq!(events.len(), 1, "{events:?}");
    assert!(is_session_stopped(&events[0]));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Closed);
}

#[tokio::test]
async fn recognizer_reconnect_reopens() {
    let mut h = joined().await;

    h.recognizer.emit(RecognizerEvent::Disconnected);
    drain(&mut h.events).await;
    h.recognizer.emit(RecognizerEvent::Connected);

    assert_eq!(drain(&mut h.events).await, vec![TranslatorEvent::Connected]);
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Open);
}

#[tokio::test]
async fn rejoin_after_clean_room_close_reopens() {
    let mut h = joined().await;

    h.transport.close(DisconnectReason::Normal, false);
    assert_eq!(drain(&mut h.events).await, vec![TranslatorEvent::Disconnected]);

    let rejoining = {
        let translator = h.translator.clone();
        tokio::spawn(async move { translator.rejoin().await })
    };
    h.transport.wait_for_connect().await;
    h.transport.open();
    h.transport.push_text(participant_list());
    rejoining.await.unwrap().unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(count(&events, |e| matches!(e, TranslatorEvent::Connected)), 1, "{events:?}");
    assert_eq!(count(&events, is_session_stopped), 0);
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Open);
    assert_eq!(h.transport.connect_count(), 2);
}

#[tokio::test]
async fn rejoin_needs_the_room_side_down() {
    let h = joined().await;
    let err = h.translator.rejoin().await.unwrap_err();
    assert!(matches!(err, ConversationError::InvalidState(_)), "{err:?}");

    let (idle, _request) = setup(TranslatorConfig::default(), false);
    let err = idle.translator.rejoin().await.unwrap_err();
    assert!(matches!(err, ConversationError::InvalidState(_)), "{err:?}");
    assert_eq!(h.transport.connect_count(), 1);
}

#[tokio::test]
async fn rejoin_refused_by_service_fails_session() {
    let mut h = joined().await;

    h.transport.close(DisconnectReason::Normal, false);
    drain(&mut h.events).await;

    let rejoining = {
        let translator = h.translator.clone();
        tokio::spawn(async move { translator.rejoin().await })
    };
    h.transport.wait_for_connect().await;
    h.transport.fail(TransportError::new(
        TransportErrorKind::UpgradeRejected(401),
        "unauthorized",
    ));

    let err = rejoining.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthenticationError);

    let events = drain(&mut h.events).await;
    assert_eq!(
        count(&events, |e| matches!(
            e,
            TranslatorEvent::Canceled { details }
                if details.code == Some(ErrorCode::AuthenticationError)
        )),
        1,
        "{events:?}"
    );
    assert_eq!(count(&events, is_session_stopped), 1);
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Failed);
}

#[tokio::test]
async fn server_requested_end_closes_when_configured() {
    let mut h = joined_with(TranslatorConfig::default(), true).await;

    h.transport.close(DisconnectReason::Normal, true);

    let events = drain(&mut h.events).await;
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(events[0], TranslatorEvent::Disconnected);
    assert!(is_session_stopped(&events[1]));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Closed);
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_error_fails_once() {
    let mut h = joined().await;

    h.transport.fail(TransportError::new(
        TransportErrorKind::RemoteClosed,
        "stream ended",
    ));

    let events = drain(&mut h.events).await;
    assert_eq!(events.len(), 3, "{events:?}");
    match &events[0] {
        TranslatorEvent::Canceled { details } => {
            assert_eq!(details.reason, CancellationReason::Error);
            assert_eq!(details.code, Some(ErrorCode::ConnectionError));
            assert_eq!(details.details, "stream ended");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(events[1], TranslatorEvent::Disconnected);
    assert!(is_session_stopped(&events[2]));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Failed);
    assert!(h.recognizer.calls().contains(&"close_connection"));

    // Nothing more from this episode.
    h.recognizer.emit(RecognizerEvent::Disconnected);
    h.translator.leave().await.unwrap();
    assert!(drain(&mut h.events).await.is_empty());
}

#[tokio::test]
async fn abnormal_close_fails_with_mapped_code() {
    let mut h = joined().await;

    h.transport.close(DisconnectReason::InternalServerError, true);

    let events = drain(&mut h.events).await;
    assert!(matches!(
        &events[0],
        TranslatorEvent::Canceled { details } if details.code == Some(ErrorCode::ServiceError)
    ));
    assert_eq!(count(&events, is_session_stopped), 1);
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Failed);
}

#[tokio::test]
async fn recognizer_error_fails_session() {
    let mut h = joined().await;

    h.recognizer.emit(RecognizerEvent::Canceled {
        reason: CancellationReason::Error,
        code: Some(ErrorCode::AuthenticationError),
        details: "token expired".into(),
    });

    let events = drain(&mut h.events).await;
    assert_eq!(events.len(), 3, "{events:?}");
    assert!(matches!(
        &events[0],
        TranslatorEvent::Canceled { details } if details.code == Some(ErrorCode::AuthenticationError)
    ));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Failed);
    assert_eq!(h.transport.disconnect_count(), 1);
}

#[tokio::test]
async fn end_of_stream_is_forwarded_without_state_change() {
    let mut h = joined().await;

    h.recognizer.emit(RecognizerEvent::Canceled {
        reason: CancellationReason::EndOfStream,
        code: None,
        details: String::new(),
    });

    let events = drain(&mut h.events).await;
    assert!(matches!(
        &events[..],
        [TranslatorEvent::Canceled { details }] if details.reason == CancellationReason::EndOfStream
    ));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Open);
}

// ---------------------------------------------------------------------------
// Leave
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_is_idempotent() {
    let mut h = joined().await;

    h.translator.leave().await.unwrap();
    let first = drain(&mut h.events).await;
    assert_eq!(first.len(), 2, "{first:?}");
    assert_eq!(first[0], TranslatorEvent::Disconnected);
    assert!(is_session_stopped(&first[1]));
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Closed);

    h.translator.leave().await.unwrap();
    assert!(drain(&mut h.events).await.is_empty());
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Closed);
}

#[tokio::test]
async fn leave_stops_recognition_first() {
    let h = joined().await;
    h.translator.start_transcribing().await.unwrap();

    h.translator.leave().await.unwrap();

    let calls = h.recognizer.calls();
    let stop = calls.iter().position(|c| *c == "stop_continuous").unwrap();
    let close = calls.iter().position(|c| *c == "close_connection").unwrap();
    assert!(stop < close);
    assert_eq!(h.transport.disconnect_count(), 1);
}

#[tokio::test]
async fn leave_gives_up_after_deadline() {
    let mut h = joined_with(
        TranslatorConfig {
            leave_timeout: Duration::from_millis(200),
        },
        false,
    )
    .await;
    h.recognizer.set_silent_close(true);

    tokio::time::timeout(Duration::from_secs(2), h.translator.leave())
        .await
        .expect("leave did not finish")
        .unwrap();

    let events = drain(&mut h.events).await;
    assert_eq!(count(&events, is_session_stopped), 1);
    assert_eq!(h.translator.state().await.unwrap(), ConversationState::Closed);
}

// ---------------------------------------------------------------------------
// Results and room traffic
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_results_share_an_utterance_id() {
    let mut h = joined().await;
    h.translator.start_transcribing().await.unwrap();

    let result = |text: &str| RecognizerResult {
        text: text.into(),
        language: "en-US".into(),
        translations: Vec::new(),
    };
    h.recognizer.emit(RecognizerEvent::Recognizing(result("hel")));
    h.recognizer.emit(RecognizerEvent::Recognizing(result("hello")));
    h.recognizer.emit(RecognizerEvent::Recognized(result("hello there")));
    h.recognizer.emit(RecognizerEvent::Recognizing(result("and")));

    let results: Vec<ConversationResult> = drain(&mut h.events)
        .await
        .into_iter()
        .filter_map(|e| match e {
            TranslatorEvent::Transcribing { result } | TranslatorEvent::Transcribed { result } => {
                Some(result)
            }
            _ => None,
        })
        .collect();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].id, results[1].id);
    assert_eq!(results[1].id, results[2].id);
    assert_ne!(results[2].id, results[3].id);
    assert_eq!(results[0].reason, ResultReason::TranslatingSpeech);
    assert_eq!(results[2].reason, ResultReason::TranslatedSpeech);
    assert!(results.iter().all(|r| r.participant_id == "p1"));
}

#[tokio::test]
async fn remote_recognitions_skip_own_echo() {
    let mut h = joined().await;

    h.transport.push_text(recognition("partial", "P1", "echo"));
    h.transport.push_text(recognition("final", "p2", "hallo"));

    let events = drain(&mut h.events).await;
    assert_eq!(events.len(), 1, "{events:?}");
    match &events[0] {
        TranslatorEvent::Transcribed { result } => {
            assert_eq!(result.reason, ResultReason::TranslatedParticipantSpeech);
            assert_eq!(result.participant_id, "p2");
            assert_eq!(result.text, "hallo");
            assert_eq!(result.translations.len(), 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn instant_messages_are_tagged_by_sender() {
    let mut h = joined().await;
    let message = |participant_id: &str| {
        json!({
            "type": "translated_message", "id": "m1", "timestamp": "t",
            "language": "en-US", "originalText": "hi", "translations": [],
            "roomid": "ROOM1", "nickname": "x", "participantId": participant_id
        })
        .to_string()
    };

    h.transport.push_text(message("p1"));
    h.transport.push_text(message("p2"));

    let reasons: Vec<ResultReason> = drain(&mut h.events)
        .await
        .into_iter()
        .filter_map(|e| match e {
            TranslatorEvent::TextMessageReceived { result } => Some(result.reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            ResultReason::TranslatedInstantMessage,
            ResultReason::TranslatedParticipantInstantMessage
        ]
    );
}

#[tokio::test]
async fn send_text_goes_to_room() {
    let h = joined().await;

    h.translator.send_text_message("hello").await.unwrap();

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["type"], "instant_message");
    assert_eq!(sent[0]["text"], "hello");
}

#[tokio::test]
async fn commands_complete_while_the_room_floods() {
    let Harness {
        transport,
        translator,
        mut events,
        ..
    } = joined().await;

    for n in 0..1200 {
        transport.push_text(recognition("partial", "p2", &format!("word {n}")));
    }
    let reader = tokio::spawn(async move {
        let mut partials = 0;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(500), events.recv()).await
        {
            if matches!(event, TranslatorEvent::Transcribing { .. }) {
                partials += 1;
            }
        }
        partials
    });

    let sent = tokio::time::timeout(Duration::from_secs(5), translator.send_text_message("hi")).await;
    assert!(matches!(sent, Ok(Ok(()))), "{sent:?}");
    assert_eq!(reader.await.unwrap(), 1200);
    assert_eq!(transport.sent().last().unwrap()["text"], "hi");
}

#[tokio::test]
async fn room_notices_are_forwarded_while_active() {
    let mut h = joined().await;
    let command = |name: &str, value: serde_json::Value| {
        json!({
            "type": "participant_command", "command": name, "value": value,
            "roomid": "ROOM1", "nickname": "Me", "participantId": "p1"
        })
        .to_string()
    };

    h.transport.push_text(command("RoomExpirationWarning", json!(3)));
    h.transport.push_text(command("SetLockState", json!(true)));

    let events = drain(&mut h.events).await;
    assert_eq!(
        events,
        vec![
            TranslatorEvent::ConversationExpiration { minutes_left: 3 },
            TranslatorEvent::RoomLockChanged { locked: true },
        ]
    );
}

#[tokio::test]
async fn token_refresh_reaches_recognizer() {
    let mut h = joined().await;

    h.transport.push_text(
        json!({"type": "info", "command": "token", "token": "fresh", "region": "eastus"})
            .to_string(),
    );
    drain(&mut h.events).await;

    assert_eq!(
        h.recognizer.tokens(),
        vec![("fresh".to_string(), "eastus".to_string())]
    );
}

#[tokio::test]
async fn host_token_push_updates_room_and_recognizer() {
    let h = joined().await;

    h.translator
        .set_authorization_token("pushed", "westus")
        .await
        .unwrap();

    assert_eq!(h.transport.sent()[0]["command"], "token");
    assert_eq!(
        h.recognizer.tokens(),
        vec![("pushed".to_string(), "westus".to_string())]
    );
}

#[tokio::test]
async fn shutdown_unregisters_from_recognizer() {
    let h = joined().await;

    h.translator.shutdown().await;

    h.recognizer.emit(RecognizerEvent::Disconnected);
    assert!(matches!(
        h.translator.state().await,
        Err(ConversationError::ActorStopped(_))
    ));
}
