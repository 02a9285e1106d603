//! Session state machine.
//!
//! Merges the room connection's liveness with the recognizer's liveness
//! into one `ConversationState`. User commands, room events, recognizer
//! events and the leave deadline are all handled on this one task.

use std::sync::Arc;

use babel_common::{new_utterance_id, ErrorCode, SessionId};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::recognizer::{Recognizer, RecognizerEvent, RecognizerResult, RecognizerSettings};
use super::types::{
    CancellationDetails, CancellationReason, Command, ConversationResult, ConversationState,
    JoinRequest, ResultReason, TranslatorConfig, TranslatorEvent,
};
use crate::connection::{ConnectionEvent, ConversationConnection};
use crate::error::ConversationError;
use crate::protocol::{InstantMessage, RecognitionKind, RecognitionMessage};
use crate::signal::SubscriptionId;
use crate::transport::DisconnectReason;

pub(super) struct TranslatorActor {
    recognizer: Arc<dyn Recognizer>,
    recognizer_subscription: Option<SubscriptionId>,
    config: TranslatorConfig,
    event_tx: mpsc::Sender<TranslatorEvent>,

    state: ConversationState,
    session_id: SessionId,
    connection: Option<ConversationConnection>,
    connection_events: Option<mpsc::UnboundedReceiver<ConnectionEvent>>,
    participant_id: String,
    session_token: String,
    end_on_leave: bool,

    conversation_connected: bool,
    recognizer_connected: bool,
    recognizing: bool,
    /// Id shared by the local partial results of the current utterance.
    utterance_id: Option<String>,

    leave_waiters: Vec<oneshot::Sender<()>>,
    leave_deadline: Option<Instant>,
}

impl TranslatorActor {
    pub(super) fn new(
        recognizer: Arc<dyn Recognizer>,
        recognizer_subscription: SubscriptionId,
        config: TranslatorConfig,
        event_tx: mpsc::Sender<TranslatorEvent>,
    ) -> Self {
        Self {
            recognizer,
            recognizer_subscription: Some(recognizer_subscription),
            config,
            event_tx,
            state: ConversationState::Closed,
            session_id: SessionId::new(),
            connection: None,
            connection_events: None,
            participant_id: String::new(),
            session_token: String::new(),
            end_on_leave: false,
            conversation_connected: false,
            recognizer_connected: false,
            recognizing: false,
            utterance_id: None,
            leave_waiters: Vec::new(),
            leave_deadline: None,
        }
    }

    pub(super) async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut recognizer_rx: mpsc::UnboundedReceiver<RecognizerEvent>,
    ) {
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                event = next_connection_event(&mut self.connection_events) => match event {
                    Some(event) => self.on_connection_event(event).await,
                    None => self.connection_events = None,
                },
                Some(event) = recognizer_rx.recv() => self.on_recognizer_event(event).await,
                _ = sleep_until(self.leave_deadline) => self.on_leave_deadline().await,
            }
        }
        debug!("Translator task stopped");
    }

    async fn emit(&self, event: TranslatorEvent) {
        let _ = self.event_tx.send(event).await;
    }

    fn set_state(&mut self, next: ConversationState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Conversation state change");
            self.state = next;
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join { request, reply } => {
                let result = self.join(*request).await;
                let _ = reply.send(result);
            }
            Command::StartTranscribing { reply } => {
                let _ = reply.send(self.start_transcribing().await);
            }
            Command::StopTranscribing { reply } => {
                let _ = reply.send(self.stop_transcribing().await);
            }
            Command::Rejoin { reply } => {
                let _ = reply.send(self.rejoin().await);
            }
            Command::SendText { text, reply } => {
                let _ = reply.send(self.send_text(&text).await);
            }
            Command::SetAuthorizationToken {
                token,
                region,
                reply,
            } => {
                let _ = reply.send(self.set_authorization_token(&token, &region).await);
            }
            Command::Leave { reply } => self.leave(reply).await,
            Command::State { reply } => {
                let _ = reply.send(self.state);
            }
            Command::Shutdown { .. } => {}
        }
    }

    fn require_active(&self, operation: &str) -> Result<(), ConversationError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(ConversationError::InvalidState(format!(
                "cannot {operation} while the conversation is {:?}",
                self.state
            )))
        }
    }

    async fn join(&mut self, request: JoinRequest) -> Result<(), ConversationError> {
        if self.state != ConversationState::Closed {
            return Err(ConversationError::InvalidState(format!(
                "cannot join while the conversation is {:?}",
                self.state
            )));
        }

        let JoinRequest {
            connection,
            events,
            args,
            language,
            translate_to,
            end_on_leave,
        } = request;

        self.set_state(ConversationState::Opening);
        self.session_id = SessionId::new();
        self.participant_id = args.participant_id.clone();
        self.session_token = args.session_token.clone();
        self.end_on_leave = end_on_leave;
        self.conversation_connected = false;
        self.recognizer_connected = false;
        self.recognizing = false;
        self.utterance_id = None;

        info!(
            room_code = %args.room_code,
            participant_id = %args.participant_id,
            session_id = %self.session_id,
            "Joining conversation"
        );

        let settings = RecognizerSettings {
            conversation_token: args.session_token.clone(),
            speech_auth_token: args.speech_auth_token.clone(),
            speech_region: args.speech_region.clone(),
            language,
            translate_to,
            participant_id: args.participant_id.clone(),
            room_code: args.room_code.clone(),
        };
        if let Err(e) = self.recognizer.configure(settings).await {
            warn!(error = %e, "Recognizer configuration failed");
            self.set_state(ConversationState::Closed);
            return Err(e);
        }

        if let Err(e) = connection
            .connect(&args.participant_id, &args.session_token)
            .await
        {
            warn!(error = %e, "Conversation connect failed");
            let _ = connection.disconnect().await;
            self.set_state(ConversationState::Closed);
            return Err(e);
        }
        self.conversation_connected = true;

        if let Err(e) = self.recognizer.open_connection().await {
            warn!(error = %e, "Recognizer connection failed");
            let _ = connection.disconnect().await;
            self.conversation_connected = false;
            self.set_state(ConversationState::Closed);
            return Err(e);
        }

        self.connection = Some(connection);
        self.connection_events = Some(events);
        self.set_state(ConversationState::PartiallyOpen);
        self.emit(TranslatorEvent::SessionStarted {
            session_id: self.session_id.clone(),
        })
        .await;
        self.evaluate_open().await;
        Ok(())
    }

    async fn rejoin(&mut self) -> Result<(), ConversationError> {
        if self.state != ConversationState::PartiallyOpen || self.conversation_connected {
            return Err(ConversationError::InvalidState(format!(
                "cannot rejoin while the conversation is {:?} (room connected: {})",
                self.state, self.conversation_connected
            )));
        }

        info!(session_id = %self.session_id, "Rejoining conversation room");
        let result = self
            .connection()?
            .connect(&self.participant_id, &self.session_token)
            .await;
        match result {
            Ok(()) => {
                self.conversation_connected = true;
                self.evaluate_open().await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Conversation rejoin failed");
                let code = e.code();
                if code.is_permanent() {
                    self.to_failed(code, e.to_string()).await;
                }
                Err(e)
            }
        }
    }

    async fn start_transcribing(&mut self) -> Result<(), ConversationError> {
        self.require_active("start transcribing")?;
        if self.recognizing {
            return Ok(());
        }
        self.recognizer.start_continuous().await?;
        self.recognizing = true;
        info!("Transcribing started");
        Ok(())
    }

    async fn stop_transcribing(&mut self) -> Result<(), ConversationError> {
        self.require_active("stop transcribing")?;
        if !self.recognizing {
            return Ok(());
        }
        self.recognizer.stop_continuous().await?;
        self.recognizing = false;
        self.utterance_id = None;
        info!("Transcribing stopped");
        Ok(())
    }

    async fn send_text(&mut self, text: &str) -> Result<(), ConversationError> {
        self.require_active("send a message")?;
        self.connection()?.send_text_message(text).await
    }

    async fn set_authorization_token(
        &mut self,
        token: &str,
        region: &str,
    ) -> Result<(), ConversationError> {
        self.require_active("update the authorization token")?;
        self.connection()?
            .set_authorization_token(token, region)
            .await?;
        self.recognizer
            .update_authorization_token(token, region)
            .await
    }

    fn connection(&self) -> Result<&ConversationConnection, ConversationError> {
        self.connection
            .as_ref()
            .ok_or_else(|| ConversationError::InvalidState("no conversation connection".into()))
    }

    async fn leave(&mut self, reply: oneshot::Sender<()>) {
        if !self.state.is_active() {
            debug!(state = ?self.state, "Leave ignored");
            let _ = reply.send(());
            return;
        }

        info!(session_id = %self.session_id, "Leaving conversation");
        let was_open = self.state == ConversationState::Open;
        self.set_state(ConversationState::Closing);
        if was_open {
            self.emit(TranslatorEvent::Disconnected).await;
        }

        self.leave_waiters.push(reply);
        self.stop_sides().await;

        if self.both_down() {
            self.to_closed().await;
        } else {
            self.leave_deadline = Some(Instant::now() + self.config.leave_timeout);
        }
    }

    async fn on_leave_deadline(&mut self) {
        self.leave_deadline = None;
        if self.state == ConversationState::Closing {
            warn!(
                conversation_connected = self.conversation_connected,
                recognizer_connected = self.recognizer_connected,
                "Leave timed out, closing anyway"
            );
            self.to_closed().await;
        }
    }

    async fn shutdown(&mut self) {
        if let Some(id) = self.recognizer_subscription.take() {
            self.recognizer.unsubscribe(id);
        }
        if self.state.is_active() || self.state == ConversationState::Closing {
            self.stop_sides().await;
        }
        self.connection_events = None;
        self.connection = None;
        for waiter in self.leave_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn both_down(&self) -> bool {
        !self.conversation_connected && !self.recognizer_connected
    }

    async fn evaluate_open(&mut self) {
        if self.state == ConversationState::PartiallyOpen
            && self.conversation_connected
            && self.recognizer_connected
        {
            self.set_state(ConversationState::Open);
            info!(session_id = %self.session_id, "Conversation open");
            self.emit(TranslatorEvent::Connected).await;
        }
    }

    /// One side went down cleanly while the session is active.
    async fn on_side_down(&mut self) {
        let was_open = self.state == ConversationState::Open;
        if self.both_down() {
            if was_open {
                self.emit(TranslatorEvent::Disconnected).await;
            }
            self.to_closed().await;
        } else if was_open {
            self.set_state(ConversationState::PartiallyOpen);
            self.emit(TranslatorEvent::Disconnected).await;
        }
    }

    async fn to_closed(&mut self) {
        self.set_state(ConversationState::Closed);
        self.leave_deadline = None;
        self.release();
        info!(session_id = %self.session_id, "Conversation closed");
        self.emit(TranslatorEvent::SessionStopped {
            session_id: self.session_id.clone(),
        })
        .await;
        for waiter in self.leave_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    async fn to_failed(&mut self, code: ErrorCode, details: String) {
        warn!(code = %code, details = %details, "Conversation failed");
        let was_open = self.state == ConversationState::Open;
        self.set_state(ConversationState::Failed);
        self.leave_deadline = None;

        self.emit(TranslatorEvent::Canceled {
            details: CancellationDetails {
                reason: CancellationReason::Error,
                code: Some(code),
                details,
            },
        })
        .await;
        if was_open {
            self.emit(TranslatorEvent::Disconnected).await;
        }
        self.emit(TranslatorEvent::SessionStopped {
            session_id: self.session_id.clone(),
        })
        .await;

        self.stop_sides().await;
        self.release();
        for waiter in self.leave_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Stop recognition and ask both sides to disconnect. Confirmation
    /// arrives later as events.
    async fn stop_sides(&mut self) {
        if self.recognizing {
            if let Err(e) = self.recognizer.stop_continuous().await {
                warn!(error = %e, "Failed to stop recognition");
            }
            self.recognizing = false;
        }
        self.utterance_id = None;
        if self.recognizer_connected {
            if let Err(e) = self.recognizer.close_connection().await {
                warn!(error = %e, "Failed to close recognizer connection");
            }
        }
        if let Some(connection) = &self.connection {
            if let Err(e) = connection.disconnect().await {
                warn!(error = %e, "Failed to disconnect from conversation");
            }
        }
    }

    /// Drop the room connection handle and its events. Anything still in
    /// flight from this session is discarded with them.
    fn release(&mut self) {
        self.connection = None;
        self.connection_events = None;
        self.conversation_connected = false;
        self.recognizer_connected = false;
        self.recognizing = false;
    }

    // -----------------------------------------------------------------------
    // Room connection events
    // -----------------------------------------------------------------------

    async fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                if matches!(
                    self.state,
                    ConversationState::Opening | ConversationState::PartiallyOpen
                ) {
                    self.conversation_connected = true;
                    self.evaluate_open().await;
                }
            }
            ConnectionEvent::Disconnected {
                reason,
                message,
                server_requested,
            } => {
                self.on_conversation_disconnected(reason, message, server_requested)
                    .await
            }
            ConnectionEvent::Error { code, message } => match self.state {
                ConversationState::Open | ConversationState::PartiallyOpen => {
                    self.conversation_connected = false;
                    self.to_failed(code, message).await;
                }
                ConversationState::Closing => {
                    self.conversation_connected = false;
                    if self.both_down() {
                        self.to_closed().await;
                    }
                }
                _ => debug!(code = %code, "Ignoring conversation error"),
            },
            ConnectionEvent::SpeechRecognition(rec) => {
                if self.state.is_active() {
                    self.on_remote_recognition(rec).await;
                }
            }
            ConnectionEvent::InstantMessage(msg) => {
                if self.state.is_active() {
                    self.on_instant_message(msg).await;
                }
            }
            ConnectionEvent::ParticipantChanged {
                reason,
                participants,
            } => {
                if self.state.is_active() {
                    self.emit(TranslatorEvent::ParticipantsChanged {
                        reason,
                        participants,
                    })
                    .await;
                }
            }
            ConnectionEvent::RoomExpirationWarning { minutes_left } => {
                if self.state.is_active() {
                    self.emit(TranslatorEvent::ConversationExpiration { minutes_left })
                        .await;
                }
            }
            ConnectionEvent::RoomLockChanged { locked } => {
                if self.state.is_active() {
                    self.emit(TranslatorEvent::RoomLockChanged { locked }).await;
                }
            }
            ConnectionEvent::AuthorizationTokenUpdated { token, region, .. } => {
                if self.state.is_active() {
                    if let Err(e) = self
                        .recognizer
                        .update_authorization_token(&token, &region)
                        .await
                    {
                        warn!(error = %e, "Failed to pass the new token to the recognizer");
                    }
                }
            }
        }
    }

    async fn on_conversation_disconnected(
        &mut self,
        reason: DisconnectReason,
        message: String,
        server_requested: bool,
    ) {
        match self.state {
            ConversationState::Open | ConversationState::PartiallyOpen => {
                self.conversation_connected = false;
                if let Some(code) = reason.error_code() {
                    let details = if message.is_empty() {
                        format!("conversation connection closed: {reason:?}")
                    } else {
                        message
                    };
                    self.to_failed(code, details).await;
                    return;
                }

                if server_requested && self.end_on_leave {
                    info!("Service ended the conversation");
                    if self.state == ConversationState::Open {
                        self.emit(TranslatorEvent::Disconnected).await;
                    }
                    self.set_state(ConversationState::Closing);
                    self.stop_sides().await;
                    self.to_closed().await;
                    return;
                }

                self.on_side_down().await;
            }
            ConversationState::Closing => {
                self.conversation_connected = false;
                if self.both_down() {
                    self.to_closed().await;
                }
            }
            state => debug!(state = ?state, reason = ?reason, "Ignoring conversation disconnect"),
        }
    }

    async fn on_remote_recognition(&mut self, rec: RecognitionMessage) {
        if rec
            .sender
            .participant_id
            .eq_ignore_ascii_case(&self.participant_id)
        {
            return;
        }
        let (reason, is_final) = match rec.kind {
            RecognitionKind::Partial => (ResultReason::TranslatingParticipantSpeech, false),
            RecognitionKind::Final => (ResultReason::TranslatedParticipantSpeech, true),
        };
        let result = ConversationResult {
            id: rec.id,
            reason,
            participant_id: rec.sender.participant_id,
            text: rec.recognition,
            language: rec.language,
            translations: rec.translations,
        };
        if is_final {
            self.emit(TranslatorEvent::Transcribed { result }).await;
        } else {
            self.emit(TranslatorEvent::Transcribing { result }).await;
        }
    }

    async fn on_instant_message(&mut self, msg: InstantMessage) {
        let reason = if msg
            .sender
            .participant_id
            .eq_ignore_ascii_case(&self.participant_id)
        {
            ResultReason::TranslatedInstantMessage
        } else {
            ResultReason::TranslatedParticipantInstantMessage
        };
        self.emit(TranslatorEvent::TextMessageReceived {
            result: ConversationResult {
                id: msg.id,
                reason,
                participant_id: msg.sender.participant_id,
                text: msg.original_text,
                language: msg.language,
                translations: msg.translations,
            },
        })
        .await;
    }

    // -----------------------------------------------------------------------
    // Recognizer events
    // -----------------------------------------------------------------------

    async fn on_recognizer_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::SessionStarted => debug!("Recognizer session started"),
            RecognizerEvent::SessionStopped => {
                debug!("Recognizer session stopped");
                self.utterance_id = None;
            }
            RecognizerEvent::Connected => {
                if matches!(
                    self.state,
                    ConversationState::Opening | ConversationState::PartiallyOpen
                ) {
                    self.recognizer_connected = true;
                    self.evaluate_open().await;
                }
            }
            RecognizerEvent::Disconnected => match self.state {
                ConversationState::Open | ConversationState::PartiallyOpen => {
                    self.recognizer_connected = false;
                    self.on_side_down().await;
                }
                ConversationState::Closing => {
                    self.recognizer_connected = false;
                    if self.both_down() {
                        self.to_closed().await;
                    }
                }
                _ => debug!(state = ?self.state, "Ignoring recognizer disconnect"),
            },
            RecognizerEvent::Recognizing(result) => {
                if self.state.is_active() {
                    self.on_local_result(result, false).await;
                }
            }
            RecognizerEvent::Recognized(result) => {
                if self.state.is_active() {
                    self.on_local_result(result, true).await;
                }
            }
            RecognizerEvent::Canceled {
                reason,
                code,
                details,
            } => {
                if !self.state.is_active() {
                    debug!(reason = ?reason, "Ignoring recognizer cancellation");
                    return;
                }
                match reason {
                    CancellationReason::Error => {
                        self.to_failed(code.unwrap_or(ErrorCode::RuntimeError), details)
                            .await;
                    }
                    CancellationReason::EndOfStream | CancellationReason::CanceledByUser => {
                        self.recognizing = false;
                        self.utterance_id = None;
                        self.emit(TranslatorEvent::Canceled {
                            details: CancellationDetails {
                                reason,
                                code,
                                details,
                            },
                        })
                        .await;
                    }
                }
            }
        }
    }

    async fn on_local_result(&mut self, result: RecognizerResult, is_final: bool) {
        let id = match self.utterance_id.take() {
            Some(id) => id,
            None => new_utterance_id(),
        };
        if !is_final {
            self.utterance_id = Some(id.clone());
        }

        let result = ConversationResult {
            id,
            reason: if is_final {
                ResultReason::TranslatedSpeech
            } else {
                ResultReason::TranslatingSpeech
            },
            participant_id: self.participant_id.clone(),
            text: result.text,
            language: result.language,
            translations: result.translations,
        };
        if is_final {
            self.emit(TranslatorEvent::Transcribed { result }).await;
        } else {
            self.emit(TranslatorEvent::Transcribing { result }).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn next_connection_event(
    events: &mut Option<mpsc::UnboundedReceiver<ConnectionEvent>>,
) -> Option<ConnectionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
