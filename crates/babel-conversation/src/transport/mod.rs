//! Streaming transport contract consumed by the conversation connection,
//! plus a `tokio-tungstenite` implementation.
//!
//! `connect` and `disconnect` return immediately; progress is reported
//! through `TransportEvent`s delivered to subscribers.

mod types;
mod websocket;

pub use types::{
    DisconnectReason, Endpoint, TransportError, TransportErrorKind, TransportEvent,
    TransportState,
};
pub use websocket::{WebSocketConfig, WebSocketTransport};

use tokio::sync::mpsc;

use crate::signal::SubscriptionId;

pub trait Transport: Send + Sync + 'static {
    /// Begin opening the connection. No-op while opening or connected.
    fn connect(&self, endpoint: Endpoint);

    /// Begin closing the connection. No-op once closed.
    fn disconnect(&self);

    fn send_text(&self, text: String) -> Result<(), TransportError>;

    fn state(&self) -> TransportState;

    fn is_connected(&self) -> bool {
        self.state() == TransportState::Connected
    }

    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<TransportEvent>);

    fn unsubscribe(&self, id: SubscriptionId);
}
