//! Conversation room connection.
//!
//! Owns one transport session, the participant roster and outbound command
//! construction. Nothing can be sent until the service's participants list
//! has arrived after connecting.

mod actor;
mod client;
mod roster;
mod types;

pub use client::ConversationConnection;
pub use roster::Roster;
pub use types::{ConnectionConfig, ConnectionEvent, Snapshot};
