//! Contract for the speech recognizer that runs alongside the room
//! connection.
//!
//! The recognizer engine itself lives elsewhere; the coordinator only
//! drives its lifecycle and listens to its events.

use async_trait::async_trait;
use babel_common::ErrorCode;
use tokio::sync::mpsc;

use super::types::CancellationReason;
use crate::error::ConversationError;
use crate::protocol::Translation;
use crate::signal::SubscriptionId;

/// Settings handed to the recognizer before its connection is opened.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RecognizerSettings {
    /// Conversation session token from create/join.
    pub conversation_token: String,
    pub speech_auth_token: String,
    pub speech_region: String,
    pub language: String,
    pub translate_to: Vec<String>,
    pub participant_id: String,
    pub room_code: String,
}

impl std::fmt::Debug for RecognizerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerSettings")
            .field("conversation_token", &"[REDACTED]")
            .field("speech_auth_token", &"[REDACTED]")
            .field("speech_region", &self.speech_region)
            .field("language", &self.language)
            .field("translate_to", &self.translate_to)
            .field("participant_id", &self.participant_id)
            .field("room_code", &self.room_code)
            .finish()
    }
}

/// One intermediate or final result from the local recognizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizerResult {
    pub text: String,
    pub language: String,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    SessionStarted,
    SessionStopped,
    Connected,
    Disconnected,
    Recognizing(RecognizerResult),
    Recognized(RecognizerResult),
    Canceled {
        reason: CancellationReason,
        code: Option<ErrorCode>,
        details: String,
    },
}

#[async_trait]
pub trait Recognizer: Send + Sync + 'static {
    async fn configure(&self, settings: RecognizerSettings) -> Result<(), ConversationError>;

    /// Open the recognizer's service connection. Completion is reported
    /// with `RecognizerEvent::Connected`.
    async fn open_connection(&self) -> Result<(), ConversationError>;

    async fn close_connection(&self) -> Result<(), ConversationError>;

    /// Returns once recognition has started.
    async fn start_continuous(&self) -> Result<(), ConversationError>;

    /// Returns once recognition has stopped.
    async fn stop_continuous(&self) -> Result<(), ConversationError>;

    async fn update_authorization_token(
        &self,
        token: &str,
        region: &str,
    ) -> Result<(), ConversationError>;

    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<RecognizerEvent>);

    fn unsubscribe(&self, id: SubscriptionId);
}
