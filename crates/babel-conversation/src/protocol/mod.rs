//! Message codec for the conversation room.
//!
//! Inbound frames are JSON objects discriminated by `type`. Frames that
//! do not decode are dropped by [`parse_message`]; the connection never
//! tears down over a single bad frame.

mod messages;
mod outbound;
mod parse;

pub use messages::{
    AuthorizationTokenMessage, CommandMessage, CommandValue, InstantMessage, Message,
    ParticipantCommandKind, ParticipantCommandMessage, ParticipantListMessage, RecognitionKind,
    RecognitionMessage, SenderInfo, SessionCommand, Translation,
};
pub use outbound::OutboundMessage;
pub use parse::{decode, parse_message, DecodeError};

#[cfg(test)]
mod tests;
