//! Background task that owns the roster and the transport session.
//!
//! User commands and transport events are both handled here, one at a
//! time, so roster updates and readiness checks never race.

use std::sync::Arc;

use babel_common::new_correlation_id;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::roster::Roster;
use super::types::{Command, ConnectionConfig, ConnectionEvent, Reply, Request, Snapshot};
use crate::error::ConversationError;
use crate::participant::ParticipantChangedReason;
use crate::protocol::{
    parse_message, AuthorizationTokenMessage, CommandMessage, CommandValue, Message,
    OutboundMessage, ParticipantCommandKind, ParticipantCommandMessage, ParticipantListMessage,
    SenderInfo, SessionCommand,
};
use crate::signal::SubscriptionId;
use crate::transport::{Endpoint, Transport, TransportEvent, TransportState};

const API_VERSION: &str = "2.0";

pub(super) struct ConnectionActor {
    transport: Arc<dyn Transport>,
    subscription: Option<SubscriptionId>,
    config: ConnectionConfig,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    roster: Roster,
    participant_id: String,
    room_id: Option<String>,
    received_roster: bool,
    muted_by_host: bool,
    connect_waiters: Vec<Reply<()>>,
}

impl ConnectionActor {
    pub(super) fn new(
        transport: Arc<dyn Transport>,
        subscription: SubscriptionId,
        config: ConnectionConfig,
        event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            transport,
            subscription: Some(subscription),
            config,
            event_tx,
            roster: Roster::new(),
            participant_id: String::new(),
            room_id: None,
            received_roster: false,
            muted_by_host: false,
            connect_waiters: Vec::new(),
        }
    }

    pub(super) async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = transport_rx.recv() => self.handle_transport_event(event),
            }
        }
        debug!("Conversation connection task stopped");
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.event_tx.send(event);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                participant_id,
                session_token,
                reply,
            } => self.connect(participant_id, session_token, reply),
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::Send { request, reply } => {
                let _ = reply.send(self.send(request));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { .. } => {}
        }
    }

    fn connect(&mut self, participant_id: String, session_token: String, reply: Reply<()>) {
        match self.transport.state() {
            TransportState::Opening | TransportState::Connected => {
                if self.received_roster {
                    let _ = reply.send(Ok(()));
                } else {
                    debug!("Connect already in progress, waiting on it");
                    self.connect_waiters.push(reply);
                }
                return;
            }
            TransportState::Destroying => {
                let _ = reply.send(Err(ConversationError::InvalidState(
                    "the transport is shutting down".into(),
                )));
                return;
            }
            TransportState::Initial | TransportState::Closed => {}
        }

        self.roster.clear();
        self.received_roster = false;
        self.muted_by_host = false;
        self.room_id = None;
        self.participant_id = participant_id;

        let correlation_id = self
            .config
            .correlation_id
            .clone()
            .unwrap_or_else(new_correlation_id);
        let endpoint = Endpoint::new(self.config.endpoint.as_str())
            .with_query("api-version", API_VERSION)
            .with_header("X-CapitoToken", session_token)
            .with_header("X-ClientTraceId", correlation_id.as_str());

        info!(
            participant_id = %self.participant_id,
            correlation_id = %correlation_id,
            "Connecting to conversation"
        );
        self.connect_waiters.push(reply);
        self.transport.connect(endpoint);
    }

    fn disconnect(&mut self) {
        match self.transport.state() {
            TransportState::Opening | TransportState::Connected => {
                info!("Disconnecting from conversation");
                self.transport.disconnect();
            }
            state => debug!(state = ?state, "Disconnect ignored"),
        }
    }

    fn shutdown(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.transport.unsubscribe(id);
        }
        self.disconnect();
        self.reject_waiters(|| ConversationError::Aborted("connection shut down".into()));
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            ready: self.is_ready(),
            room_id: self.room_id.clone(),
            participant_id: self.participant_id.clone(),
            muted_by_host: self.muted_by_host,
            participants: self.roster.snapshot(),
        }
    }

    fn is_ready(&self) -> bool {
        self.received_roster && self.transport.is_connected()
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn send(&mut self, request: Request) -> Result<(), ConversationError> {
        if !self.transport.is_connected() {
            return Err(ConversationError::InvalidState("not connected".into()));
        }
        if !self.received_roster {
            return Err(ConversationError::InvalidState(
                "connected but have not yet received the participants list".into(),
            ));
        }

        let me = self.roster.get(&self.participant_id).cloned();
        let is_host = me.as_ref().is_some_and(|p| p.is_host);
        if request.host_only() && !is_host {
            return Err(ConversationError::NotPermitted(
                "only the host can send this command".into(),
            ));
        }

        let sender = SenderInfo {
            room_id: self.room_id.clone().unwrap_or_default(),
            nickname: me.as_ref().map(|p| p.nickname.clone()).unwrap_or_default(),
            participant_id: self.participant_id.clone(),
            avatar: me.as_ref().map(|p| p.avatar.clone()).unwrap_or_default(),
        };

        let message = match request {
            Request::Text(text) => {
                if text.is_empty() {
                    debug!("Ignoring empty text message");
                    return Ok(());
                }
                let muted = me.as_ref().is_some_and(|p| p.is_muted) || self.muted_by_host;
                if muted && !is_host {
                    return Err(ConversationError::NotPermitted(
                        "muted participants cannot send messages".into(),
                    ));
                }
                OutboundMessage::InstantMessage { sender, text }
            }
            Request::TtsEnabled(enabled) => participant_command(
                sender,
                ParticipantCommandKind::SetUseTts,
                CommandValue::Bool(enabled),
            ),
            Request::Nickname(nickname) => {
                if nickname.is_empty() {
                    return Err(ConversationError::InvalidArgument(
                        "nickname cannot be empty".into(),
                    ));
                }
                participant_command(
                    sender,
                    ParticipantCommandKind::ChangeNickname,
                    CommandValue::Text(nickname),
                )
            }
            Request::RoomLocked(locked) => participant_command(
                sender,
                ParticipantCommandKind::SetLockState,
                CommandValue::Bool(locked),
            ),
            Request::MuteEveryoneElse(muted) => participant_command(
                sender,
                ParticipantCommandKind::SetMuteAll,
                CommandValue::Bool(muted),
            ),
            Request::MuteParticipant {
                participant_id,
                muted,
            } => {
                let target = self.roster.get(&participant_id).ok_or_else(|| {
                    ConversationError::InvalidArgument(format!(
                        "no participant with id {participant_id}"
                    ))
                })?;
                // Addressed to the target rather than from the host.
                let target_sender = SenderInfo {
                    nickname: target.nickname.clone(),
                    participant_id: target.id.clone(),
                    avatar: String::new(),
                    ..sender
                };
                participant_command(
                    target_sender,
                    ParticipantCommandKind::SetMute,
                    CommandValue::Bool(muted),
                )
            }
            Request::Eject { participant_id } => {
                if participant_id.is_empty() {
                    return Err(ConversationError::InvalidArgument(
                        "participant id cannot be empty".into(),
                    ));
                }
                participant_command(
                    sender,
                    ParticipantCommandKind::EjectParticipant,
                    CommandValue::Text(participant_id),
                )
            }
            Request::AuthorizationToken { token, region } => {
                if token.is_empty() || region.is_empty() {
                    return Err(ConversationError::InvalidArgument(
                        "token and region are required".into(),
                    ));
                }
                OutboundMessage::AuthorizationToken {
                    room_id: sender.room_id,
                    token,
                    region,
                }
            }
        };

        debug!(message = ?message, "Sending to conversation");
        let text = message
            .to_json()
            .map_err(|e| ConversationError::InvalidArgument(e.to_string()))?;
        self.transport
            .send_text(text)
            .map_err(|e| ConversationError::Transport {
                code: e.error_code(),
                message: e.message,
            })
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                debug!("Socket open, waiting for the participants list");
            }
            TransportEvent::Text(text) => {
                if let Some(message) = parse_message(&text) {
                    self.dispatch(message);
                }
            }
            TransportEvent::Binary(data) => {
                debug!(len = data.len(), "Ignoring binary frame");
            }
            TransportEvent::Disconnected {
                reason,
                message,
                server_requested,
            } => {
                info!(reason = ?reason, server_requested, "Conversation disconnected");
                self.received_roster = false;
                self.muted_by_host = false;
                self.room_id = None;
                let detail = format!("disconnected ({reason:?}) {message}");
                self.reject_waiters(|| ConversationError::Aborted(detail.clone()));
                self.emit(ConnectionEvent::Disconnected {
                    reason,
                    message,
                    server_requested,
                });
            }
            TransportEvent::Error(err) => {
                warn!(error = %err, "Conversation transport error");
                self.received_roster = false;
                self.muted_by_host = false;
                self.room_id = None;
                let code = err.error_code();
                self.reject_waiters(|| ConversationError::Transport {
                    code,
                    message: err.message.clone(),
                });
                self.emit(ConnectionEvent::Error {
                    code,
                    message: err.message,
                });
            }
        }
    }

    fn reject_waiters(&mut self, err: impl Fn() -> ConversationError) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(err()));
        }
    }

    // -----------------------------------------------------------------------
    // Inbound dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::ParticipantList(list) => self.on_participant_list(list),
            Message::AuthorizationToken(token) => self.on_authorization_token(token),
            Message::Command(cmd) => self.on_command(cmd),
            Message::ParticipantCommand(cmd) => self.on_participant_command(cmd),
            Message::Recognition(rec) => {
                self.emit(ConnectionEvent::SpeechRecognition(rec));
            }
            Message::InstantMessage(msg) => {
                self.emit(ConnectionEvent::InstantMessage(msg));
            }
        }
    }

    fn on_participant_list(&mut self, list: ParticipantListMessage) {
        let first = !self.received_roster;
        self.received_roster = true;
        if list.room_id.is_some() {
            self.room_id = list.room_id;
        }

        let participants: Vec<_> = list
            .participants
            .into_iter()
            .map(|p| self.roster.upsert(p))
            .collect();

        info!(
            room_id = self.room_id.as_deref().unwrap_or(""),
            count = participants.len(),
            first,
            "Received participants list"
        );

        if first {
            for waiter in self.connect_waiters.drain(..) {
                let _ = waiter.send(Ok(()));
            }
            self.emit(ConnectionEvent::Connected);
        }

        self.emit(ConnectionEvent::ParticipantChanged {
            reason: ParticipantChangedReason::JoinedConversation,
            participants,
        });
    }

    fn on_authorization_token(&mut self, token: AuthorizationTokenMessage) {
        info!(region = %token.region, "Received authorization token update");
        self.emit(ConnectionEvent::AuthorizationTokenUpdated {
            token: token.token,
            region: token.region,
            valid_until: token.valid_until,
        });
    }

    fn on_command(&mut self, cmd: CommandMessage) {
        match cmd.command {
            SessionCommand::JoinSession => {
                let participant = self.roster.join(&cmd);
                debug!(participant_id = %participant.id, "Participant joined");
                self.emit(ConnectionEvent::ParticipantChanged {
                    reason: ParticipantChangedReason::JoinedConversation,
                    participants: vec![participant],
                });
            }
            SessionCommand::LeaveSession => match self.roster.leave(&cmd) {
                Some(participant) => {
                    debug!(participant_id = %participant.id, "Participant left");
                    self.emit(ConnectionEvent::ParticipantChanged {
                        reason: ParticipantChangedReason::LeftConversation,
                        participants: vec![participant],
                    });
                }
                None => {
                    debug!(participant_id = %cmd.sender.participant_id, "Leave for unknown participant");
                }
            },
            SessionCommand::DisconnectSession => {
                debug!(participant_id = %cmd.sender.participant_id, "Ignoring DisconnectSession");
            }
        }
    }

    fn on_participant_command(&mut self, cmd: ParticipantCommandMessage) {
        let ParticipantCommandMessage {
            sender,
            command,
            value,
        } = cmd;

        let updated = match (command, &value) {
            (ParticipantCommandKind::ChangeNickname, CommandValue::Text(nickname)) => {
                let nickname = nickname.clone();
                self.roster.update(&sender, |p| p.nickname = nickname)
            }
            (ParticipantCommandKind::SetMute, CommandValue::Bool(muted)) => {
                let muted = *muted;
                self.roster.update(&sender, |p| p.is_muted = muted)
            }
            (ParticipantCommandKind::SetUseTts, CommandValue::Bool(tts)) => {
                let tts = *tts;
                self.roster.update(&sender, |p| p.uses_tts = tts)
            }
            (ParticipantCommandKind::SetMuteAll, CommandValue::Bool(muted)) => {
                self.muted_by_host = *muted;
                let changed = self.roster.mute_all(*muted);
                if !changed.is_empty() {
                    self.emit(ConnectionEvent::ParticipantChanged {
                        reason: ParticipantChangedReason::Updated,
                        participants: changed,
                    });
                }
                return;
            }
            (ParticipantCommandKind::RoomExpirationWarning, value) => {
                let minutes_left = match value {
                    CommandValue::Integer(minutes) => Some(*minutes),
                    CommandValue::Text(text) => text.trim().parse().ok(),
                    CommandValue::Bool(_) => None,
                };
                match minutes_left {
                    Some(minutes_left) => {
                        self.emit(ConnectionEvent::RoomExpirationWarning { minutes_left });
                    }
                    None => debug!(value = ?value, "Unusable expiration warning"),
                }
                return;
            }
            (ParticipantCommandKind::SetLockState, CommandValue::Bool(locked)) => {
                self.emit(ConnectionEvent::RoomLockChanged { locked: *locked });
                return;
            }
            (
                ParticipantCommandKind::EjectParticipant
                | ParticipantCommandKind::Joined
                | ParticipantCommandKind::Left,
                _,
            ) => {
                debug!(command = command.as_str(), "Ignoring participant command");
                return;
            }
            (command, value) => {
                debug!(
                    command = command.as_str(),
                    value = ?value,
                    "Participant command with unexpected value"
                );
                return;
            }
        };

        self.emit(ConnectionEvent::ParticipantChanged {
            reason: ParticipantChangedReason::Updated,
            participants: vec![updated],
        });
    }
}

fn participant_command(
    sender: SenderInfo,
    command: ParticipantCommandKind,
    value: CommandValue,
) -> OutboundMessage {
    OutboundMessage::ParticipantCommand {
        sender,
        command,
        value,
    }
}
