//! Public handle for the conversation connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::actor::ConnectionActor;
use super::types::{Command, ConnectionConfig, ConnectionEvent, Request, Snapshot};
use crate::error::ConversationError;
use crate::participant::Participant;
use crate::transport::Transport;

const ACTOR: &str = "conversation connection";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to one conversation room connection.
///
/// Cloning is cheap; every clone talks to the same background task.
#[derive(Clone)]
pub struct ConversationConnection {
    command_tx: mpsc::Sender<Command>,
    connect_timeout: Duration,
}

impl ConversationConnection {
    /// Spawn the connection task on top of `transport`.
    /// Returns `(connection, event_receiver)`.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(64);
        let (subscription, transport_rx) = transport.subscribe();
        let connect_timeout = config.connect_timeout;

        let actor = ConnectionActor::new(transport, subscription, config, event_tx);
        tokio::spawn(actor.run(command_rx, transport_rx));

        (
            Self {
                command_tx,
                connect_timeout,
            },
            event_rx,
        )
    }

    /// Open the room connection and wait for the participants list.
    ///
    /// If a connect is already in flight this waits on that attempt
    /// instead of starting another.
    pub async fn connect(
        &self,
        participant_id: &str,
        session_token: &str,
    ) -> Result<(), ConversationError> {
        if participant_id.is_empty() || session_token.is_empty() {
            return Err(ConversationError::InvalidArgument(
                "participant id and session token are required".into(),
            ));
        }

        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Connect {
                participant_id: participant_id.to_string(),
                session_token: session_token.to_string(),
                reply,
            })
            .await
            .map_err(|_| ConversationError::ActorStopped(ACTOR))?;

        match tokio::time::timeout(self.connect_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ConversationError::Aborted(
                "connection task dropped the connect request".into(),
            )),
            Err(_) => {
                warn!(
                    timeout_secs = self.connect_timeout.as_secs(),
                    "Timed out waiting for the participants list"
                );
                Err(ConversationError::Timeout)
            }
        }
    }

    /// Close the room connection. No-op when already closed.
    pub async fn disconnect(&self) -> Result<(), ConversationError> {
        self.call(|reply| Command::Disconnect { reply }).await
    }

    /// Stop the background task. Transport callbacks are unregistered
    /// before the socket is closed.
    pub async fn shutdown(&self) {
        let _ = self.call(|reply| Command::Shutdown { reply }).await;
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ConversationError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    /// Connected and the participants list has been received.
    pub async fn is_connected(&self) -> bool {
        self.snapshot().await.is_ok_and(|s| s.ready)
    }

    /// Muted by the host through mute-all.
    pub async fn is_muted_by_host(&self) -> bool {
        self.snapshot().await.is_ok_and(|s| s.muted_by_host)
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, ConversationError> {
        Ok(self.snapshot().await?.participants)
    }

    pub async fn room_id(&self) -> Result<Option<String>, ConversationError> {
        Ok(self.snapshot().await?.room_id)
    }

    // -----------------------------------------------------------------------
    // Participant commands
    // -----------------------------------------------------------------------

    /// Send an instant message to the room. Empty text is ignored.
    pub async fn send_text_message(&self, text: &str) -> Result<(), ConversationError> {
        self.send(Request::Text(text.to_string())).await
    }

    pub async fn set_tts_enabled(&self, enabled: bool) -> Result<(), ConversationError> {
        self.send(Request::TtsEnabled(enabled)).await
    }

    pub async fn set_nickname(&self, nickname: &str) -> Result<(), ConversationError> {
        self.send(Request::Nickname(nickname.to_string())).await
    }

    // -----------------------------------------------------------------------
    // Host commands
    // -----------------------------------------------------------------------

    pub async fn set_room_locked(&self, locked: bool) -> Result<(), ConversationError> {
        self.send(Request::RoomLocked(locked)).await
    }

    pub async fn set_mute_everyone_else(&self, muted: bool) -> Result<(), ConversationError> {
        self.send(Request::MuteEveryoneElse(muted)).await
    }

    pub async fn set_mute_participant(
        &self,
        participant_id: &str,
        muted: bool,
    ) -> Result<(), ConversationError> {
        self.send(Request::MuteParticipant {
            participant_id: participant_id.to_string(),
            muted,
        })
        .await
    }

    pub async fn eject_participant(&self, participant_id: &str) -> Result<(), ConversationError> {
        self.send(Request::Eject {
            participant_id: participant_id.to_string(),
        })
        .await
    }

    /// Push fresh speech credentials to everyone in the room.
    pub async fn set_authorization_token(
        &self,
        token: &str,
        region: &str,
    ) -> Result<(), ConversationError> {
        self.send(Request::AuthorizationToken {
            token: token.to_string(),
            region: region.to_string(),
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn send(&self, request: Request) -> Result<(), ConversationError> {
        self.call(|reply| Command::Send { request, reply }).await?
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ConversationError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| ConversationError::ActorStopped(ACTOR))?;
        rx.await.map_err(|_| ConversationError::ActorStopped(ACTOR))
    }
}
