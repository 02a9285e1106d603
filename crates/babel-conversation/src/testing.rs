//! In-memory transport and recognizer doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConversationError;
use crate::signal::{EventHub, SubscriptionId};
use crate::transport::{
    DisconnectReason, Endpoint, Transport, TransportError, TransportEvent, TransportState,
};
use crate::translator::{Recognizer, RecognizerEvent, RecognizerSettings};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Transport driven by the test: it never opens on its own.
pub struct MockTransport {
    state: Mutex<TransportState>,
    hub: EventHub<TransportEvent>,
    endpoint: Mutex<Option<Endpoint>>,
    sent: Mutex<Vec<String>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TransportState::Initial),
            hub: EventHub::new(),
            endpoint: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Wait until `connect` has been called and return its endpoint.
    pub async fn wait_for_connect(&self) -> Endpoint {
        for _ in 0..500 {
            if let Some(endpoint) = lock(&self.endpoint).clone() {
                return endpoint;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("transport was never connected");
    }

    pub fn open(&self) {
        *lock(&self.state) = TransportState::Connected;
        self.hub.emit(TransportEvent::Connected);
    }

    pub fn push_text(&self, text: String) {
        self.hub.emit(TransportEvent::Text(text));
    }

    /// Close from the remote side.
    pub fn close(&self, reason: DisconnectReason, server_requested: bool) {
        *lock(&self.state) = TransportState::Closed;
        lock(&self.endpoint).take();
        self.hub.emit(TransportEvent::Disconnected {
            reason,
            message: String::new(),
            server_requested,
        });
    }

    pub fn fail(&self, err: TransportError) {
        *lock(&self.state) = TransportState::Closed;
        lock(&self.endpoint).take();
        self.hub.emit(TransportEvent::Error(err));
    }

    /// Frames sent so far, parsed as JSON.
    pub fn sent(&self) -> Vec<serde_json::Value> {
        lock(&self.sent)
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frame is not JSON"))
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

impl Transport for MockTransport {
    fn connect(&self, endpoint: Endpoint) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state) = TransportState::Opening;
        *lock(&self.endpoint) = Some(endpoint);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let was_active = {
            let mut state = lock(&self.state);
            let active = matches!(*state, TransportState::Opening | TransportState::Connected);
            if active {
                *state = TransportState::Closed;
            }
            active
        };
        if was_active {
            lock(&self.endpoint).take();
            self.hub.emit(TransportEvent::Disconnected {
                reason: DisconnectReason::Normal,
                message: String::new(),
                server_requested: false,
            });
        }
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        lock(&self.sent).push(text);
        Ok(())
    }

    fn state(&self) -> TransportState {
        *lock(&self.state)
    }

    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<TransportEvent>) {
        self.hub.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id);
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

/// Recognizer that acknowledges every call immediately through its events.
pub struct MockRecognizer {
    hub: EventHub<RecognizerEvent>,
    settings: Mutex<Option<RecognizerSettings>>,
    calls: Mutex<Vec<&'static str>>,
    tokens: Mutex<Vec<(String, String)>>,
    /// When set, `close_connection` does not report `Disconnected`.
    silent_close: AtomicBool,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            hub: EventHub::new(),
            settings: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            silent_close: AtomicBool::new(false),
        }
    }

    pub fn emit(&self, event: RecognizerEvent) {
        self.hub.emit(event);
    }

    pub fn settings(&self) -> Option<RecognizerSettings> {
        lock(&self.settings).clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    pub fn tokens(&self) -> Vec<(String, String)> {
        lock(&self.tokens).clone()
    }

    pub fn set_silent_close(&self, silent: bool) {
        self.silent_close.store(silent, Ordering::SeqCst);
    }

    fn record(&self, call: &'static str) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn configure(&self, settings: RecognizerSettings) -> Result<(), ConversationError> {
        self.record("configure");
        *lock(&self.settings) = Some(settings);
        Ok(())
    }

    async fn open_connection(&self) -> Result<(), ConversationError> {
        self.record("open_connection");
        self.hub.emit(RecognizerEvent::Connected);
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), ConversationError> {
        self.record("close_connection");
        if !self.silent_close.load(Ordering::SeqCst) {
            self.hub.emit(RecognizerEvent::Disconnected);
        }
        Ok(())
    }

    async fn start_continuous(&self) -> Result<(), ConversationError> {
        self.record("start_continuous");
        self.hub.emit(RecognizerEvent::SessionStarted);
        Ok(())
    }

    async fn stop_continuous(&self) -> Result<(), ConversationError> {
        self.record("stop_continuous");
        self.hub.emit(RecognizerEvent::SessionStopped);
        Ok(())
    }

    async fn update_authorization_token(
        &self,
        token: &str,
        region: &str,
    ) -> Result<(), ConversationError> {
        self.record("update_authorization_token");
        lock(&self.tokens).push((token.to_string(), region.to_string()));
        Ok(())
    }

    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<RecognizerEvent>) {
        self.hub.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id);
    }
}
