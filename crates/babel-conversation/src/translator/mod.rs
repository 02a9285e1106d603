//! Session coordinator.
//!
//! Merges the room connection's liveness with the speech recognizer's
//! liveness into one session lifecycle:
//!
//! ```text
//! Closed -> Opening -> PartiallyOpen <-> Open
//!                          |              |
//!                          +-> Closing <--+--> Failed
//!                                 |
//!                               Closed
//! ```

mod client;
mod machine;
mod recognizer;
mod types;

pub use client::ConversationTranslator;
pub use recognizer::{Recognizer, RecognizerEvent, RecognizerResult, RecognizerSettings};
pub use types::{
    CancellationDetails, CancellationReason, ConversationResult, ConversationState, JoinRequest,
    ResultReason, TranslatorConfig, TranslatorEvent,
};

#[cfg(test)]
mod tests;
