//! Public handle for the session coordinator.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::machine::TranslatorActor;
use super::recognizer::Recognizer;
use super::types::{Command, ConversationState, JoinRequest, TranslatorConfig, TranslatorEvent};
use crate::conversation::Conversation;
use crate::error::ConversationError;

const ACTOR: &str = "conversation translator";

/// Joins a conversation and keeps the room connection and the local
/// recognizer in step.
///
/// Every operation runs on one background task, in the order it was
/// issued. Events arrive on the receiver returned by [`new`](Self::new).
#[derive(Clone)]
pub struct ConversationTranslator {
    command_tx: mpsc::Sender<Command>,
}

impl ConversationTranslator {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        config: TranslatorConfig,
    ) -> (Self, mpsc::Receiver<TranslatorEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (subscription, recognizer_rx) = recognizer.subscribe();

        let actor = TranslatorActor::new(recognizer, subscription, config, event_tx);
        tokio::spawn(actor.run(command_rx, recognizer_rx));

        (Self { command_tx }, event_rx)
    }

    /// Join `conversation`. Only valid while `Closed`.
    ///
    /// With `end_on_leave`, a clean close requested by the service (the
    /// host deleted the room) ends the session instead of leaving it
    /// partially open.
    pub async fn join(
        &self,
        conversation: &Conversation,
        end_on_leave: bool,
    ) -> Result<(), ConversationError> {
        let request = conversation.join_request(end_on_leave)?;
        self.join_with(request).await
    }

    pub async fn join_with(&self, request: JoinRequest) -> Result<(), ConversationError> {
        self.call(|reply| Command::Join {
            request: Box::new(request),
            reply,
        })
        .await?
    }

    pub async fn start_transcribing(&self) -> Result<(), ConversationError> {
        self.call(|reply| Command::StartTranscribing { reply }).await?
    }

    pub async fn stop_transcribing(&self) -> Result<(), ConversationError> {
        self.call(|reply| Command::StopTranscribing { reply }).await?
    }

    /// Reconnect to the room after it closed cleanly while the recognizer
    /// stayed up. Only valid while `PartiallyOpen` with the room side down.
    pub async fn rejoin(&self) -> Result<(), ConversationError> {
        self.call(|reply| Command::Rejoin { reply }).await?
    }

    pub async fn send_text_message(&self, text: &str) -> Result<(), ConversationError> {
        self.call(|reply| Command::SendText {
            text: text.to_string(),
            reply,
        })
        .await?
    }

    /// Host only: push fresh speech credentials to the room and to the
    /// local recognizer.
    pub async fn set_authorization_token(
        &self,
        token: &str,
        region: &str,
    ) -> Result<(), ConversationError> {
        self.call(|reply| Command::SetAuthorizationToken {
            token: token.to_string(),
            region: region.to_string(),
            reply,
        })
        .await?
    }

    /// Leave the conversation and wait until the session is closed.
    /// Silent no-op when there is nothing to leave.
    pub async fn leave(&self) -> Result<(), ConversationError> {
        self.call(|reply| Command::Leave { reply }).await
    }

    pub async fn state(&self) -> Result<ConversationState, ConversationError> {
        self.call(|reply| Command::State { reply }).await
    }

    /// Stop the background task. Recognizer callbacks are unregistered
    /// first.
    pub async fn shutdown(&self) {
        let _ = self.call(|reply| Command::Shutdown { reply }).await;
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
