pub mod connection;
pub mod conversation;
pub mod error;
pub mod participant;
pub mod protocol;
pub mod room_manager;
pub mod signal;
pub mod translator;
pub mod transport;

#[cfg(test)]
mod testing;

pub use connection::{ConnectionConfig, ConnectionEvent, ConversationConnection};
pub use conversation::Conversation;
pub use error::ConversationError;
pub use participant::{Participant, ParticipantChangedReason};
pub use room_manager::{
    ConversationArgs, CreateConversationArgs, RoomManager, RoomManagerConfig, TtsFormat,
};
pub use signal::{EventHub, SubscriptionId};
pub use translator::{
    CancellationDetails, CancellationReason, ConversationResult, ConversationState,
    ConversationTranslator, JoinRequest, Recognizer, RecognizerEvent, RecognizerResult,
    RecognizerSettings, ResultReason, TranslatorConfig, TranslatorEvent,
};
pub use transport::{Transport, WebSocketConfig, WebSocketTransport};
