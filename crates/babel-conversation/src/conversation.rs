//! Conversation owner: room credentials plus the room connection.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::connection::{ConnectionConfig, ConnectionEvent, ConversationConnection};
use crate::error::ConversationError;
use crate::participant::Participant;
use crate::room_manager::{ConversationArgs, CreateConversationArgs, RoomManager};
use crate::translator::JoinRequest;
use crate::transport::Transport;

/// A created or joined room.
///
/// Holds the credentials from the room service and the connection built on
/// them. The connection's events are handed to whichever translator joins.
pub struct Conversation {
    rooms: Arc<RoomManager>,
    create_args: CreateConversationArgs,
    args: ConversationArgs,
    connection: ConversationConnection,
    events: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
}

impl Conversation {
    /// Create a room, or join `room_code`, and set up (but do not open)
    /// the room connection.
    pub async fn create_or_join(
        rooms: Arc<RoomManager>,
        transport: Arc<dyn Transport>,
        create_args: CreateConversationArgs,
        room_code: Option<&str>,
        room_pin: Option<&str>,
        mut connection_config: ConnectionConfig,
    ) -> Result<Self, ConversationError> {
        let args = rooms
            .create_or_join(&create_args, room_code, room_pin)
            .await?;

        if connection_config.correlation_id.is_none() && !args.correlation_id.is_empty() {
            connection_config.correlation_id = Some(args.correlation_id.clone());
        }
        let (connection, events) = ConversationConnection::new(transport, connection_config);

        Ok(Self {
            rooms,
            create_args,
            args,
            connection,
            events: Mutex::new(Some(events)),
        })
    }

    pub fn args(&self) -> &ConversationArgs {
        &self.args
    }

    pub fn room_code(&self) -> &str {
        &self.args.room_code
    }

    pub fn connection(&self) -> &ConversationConnection {
        &self.connection
    }

    /// Take the connection's event stream. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    pub(crate) fn join_request(&self, end_on_leave: bool) -> Result<JoinRequest, ConversationError> {
        let events = self.take_events().ok_or_else(|| {
            ConversationError::InvalidState(
                "this conversation has already been joined by a translator".into(),
            )
        })?;
        Ok(JoinRequest {
            connection: self.connection.clone(),
            events,
            args: self.args.clone(),
            language: self.create_args.language.clone(),
            translate_to: self.create_args.translate_to.clone(),
            end_on_leave,
        })
    }

    /// Open the room connection and wait for the participants list.
    pub async fn start(&self) -> Result<(), ConversationError> {
        self.connection
            .connect(&self.args.participant_id, &self.args.session_token)
            .await
    }

    /// Close the room connection. The room itself stays alive.
    pub async fn end(&self) -> Result<(), ConversationError> {
        self.connection.disconnect().await
    }

    /// Leave the room on the service and stop the connection. A room that
    /// no longer exists counts as left.
    pub async fn delete(&self) -> Result<(), ConversationError> {
        let result = match self.rooms.leave(&self.args.session_token).await {
            Err(ConversationError::Http { status: 404, .. }) => {
                info!(room_code = %self.args.room_code, "Room already gone");
                Ok(())
            }
            other => other,
        };
        if let Err(e) = &result {
            warn!(error = %e, "Failed to leave room");
        }
        self.connection.shutdown().await;
        result
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, ConversationError> {
        self.connection.participants().await
    }

    // -----------------------------------------------------------------------
    // Host commands
    // -----------------------------------------------------------------------

    pub async fn set_room_locked(&self, locked: bool) -> Result<(), ConversationError> {
        self.connection.set_room_locked(locked).await
    }

    pub async fn set_mute_everyone_else(&self, muted: bool) -> Result<(), ConversationError> {
        self.connection.set_mute_everyone_else(muted).await
    }

    pub async fn set_mute_participant(
        &self,
        participant_id: &str,
        muted: bool,
    ) -> Result<(), ConversationError> {
        self.connection
            .set_mute_participant(participant_id, muted)
            .await
    }

    pub async fn eject_participant(&self, participant_id: &str) -> Result<(), ConversationError> {
        self.connection.eject_participant(participant_id).await
    }
}
