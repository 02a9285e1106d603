//! Room REST API: create or join a room to obtain conversation credentials,
//! and leave it again.

mod client;
mod types;

pub use client::RoomManager;
pub use types::{ConversationArgs, CreateConversationArgs, RoomManagerConfig, TtsFormat};
