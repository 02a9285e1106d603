//! WebSocket transport over `tokio-tungstenite`.
//!
//! One background task per connection owns the socket. Outbound frames and
//! close requests reach it over a channel; everything it observes is
//! published through the transport's `EventHub`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, error, info, warn};

use super::types::{
    DisconnectReason, Endpoint, TransportError, TransportErrorKind, TransportEvent,
    TransportState,
};
use super::Transport;
use crate::signal::{EventHub, SubscriptionId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Bound on TCP connect, TLS and the upgrade handshake.
    pub connect_timeout: Duration,
    /// Ping cadence while connected. `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

enum Outbound {
    Text(String),
    Close,
}

struct Shared {
    state: Mutex<TransportState>,
    hub: EventHub<TransportEvent>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

pub struct WebSocketTransport {
    config: WebSocketConfig,
    shared: Arc<Shared>,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(TransportState::Initial),
                hub: EventHub::new(),
                outbound: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(WebSocketConfig::default())
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, endpoint: Endpoint) {
        {
            let mut state = lock(&self.shared.state);
            if matches!(*state, TransportState::Opening | TransportState::Connected) {
                debug!(state = ?*state, "Connect ignored, socket already active");
                return;
            }
            *state = TransportState::Opening;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.outbound) = Some(tx);
        let handle = tokio::spawn(connection_task(
            Arc::clone(&self.shared),
            self.config.clone(),
            endpoint,
            rx,
        ));
        *lock(&self.shared.task) = Some(handle);
    }

    fn disconnect(&self) {
        let state = *lock(&self.shared.state);
        match state {
            TransportState::Initial | TransportState::Closed | TransportState::Destroying => {}
            TransportState::Opening => {
                if let Some(handle) = lock(&self.shared.task).take() {
                    handle.abort();
                }
                lock(&self.shared.outbound).take();
                *lock(&self.shared.state) = TransportState::Closed;
                self.shared.hub.emit(TransportEvent::Disconnected {
                    reason: DisconnectReason::Normal,
                    message: "closed before the socket opened".into(),
                    server_requested: false,
                });
            }
            TransportState::Connected => {
                if let Some(tx) = lock(&self.shared.outbound).as_ref() {
                    let _ = tx.send(Outbound::Close);
                }
            }
        }
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.state() != TransportState::Connected {
            return Err(TransportError::new(
                TransportErrorKind::SendFrame,
                "socket is not connected",
            ));
        }
        lock(&self.shared.outbound)
            .as_ref()
            .ok_or_else(|| TransportError::new(TransportErrorKind::SendFrame, "socket is closing"))?
            .send(Outbound::Text(text))
            .map_err(|_| {
                TransportError::new(TransportErrorKind::SendFrame, "connection task has stopped")
            })
    }

    fn state(&self) -> TransportState {
        *lock(&self.shared.state)
    }

    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<TransportEvent>) {
        self.shared.hub.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.hub.unsubscribe(id);
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        *lock(&self.shared.state) = TransportState::Destroying;
        if let Some(handle) = lock(&self.shared.task).take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Connection Task
// ---------------------------------------------------------------------------

async fn connection_task(
    shared: Arc<Shared>,
    config: WebSocketConfig,
    endpoint: Endpoint,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) {
    let request = match build_request(&endpoint) {
        Ok(request) => request,
        Err(e) => {
            fail(&shared, e);
            return;
        }
    };

    info!(url = %endpoint.url.split('?').next().unwrap_or(""), "Opening conversation socket");

    let ws_stream = match tokio::time::timeout(
        config.connect_timeout,
        tokio_tungstenite::connect_async(request),
    )
    .await
    {
        Ok(Ok((ws_stream, _))) => ws_stream,
        Ok(Err(e)) => {
            error!(error = %e, "Failed to open conversation socket");
            fail(&shared, map_ws_error(&e));
            return;
        }
        Err(_elapsed) => {
            error!(
                timeout_secs = config.connect_timeout.as_secs(),
                "Conversation socket open timed out"
            );
            fail(
                &shared,
                TransportError::new(
                    TransportErrorKind::ConnectionFailure,
                    format!(
                        "connection timed out after {}s",
                        config.connect_timeout.as_secs()
                    ),
                ),
            );
            return;
        }
    };

    *lock(&shared.state) = TransportState::Connected;
    shared.hub.emit(TransportEvent::Connected);

    let (mut write, mut read) = ws_stream.split();
    let mut ping = config.ping_interval.map(tokio::time::interval);

    let (reason, message, server_requested) = loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    shared.hub.emit(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    shared.hub.emit(TransportEvent::Binary(data.to_vec()));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (reason, message) = frame
                        .map(|f| {
                            (
                                DisconnectReason::from_close_code(u16::from(f.code)),
                                f.reason.as_str().to_owned(),
                            )
                        })
                        .unwrap_or((DisconnectReason::Normal, String::new()));
                    info!(reason = ?reason, "Conversation service closed the socket");
                    break (reason, message, true);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    shared.hub.emit(TransportEvent::Error(map_ws_error(&e)));
                    break (DisconnectReason::Unknown, e.to_string(), true);
                }
                None => {
                    shared.hub.emit(TransportEvent::Error(TransportError::new(
                        TransportErrorKind::RemoteClosed,
                        "stream ended without a close frame",
                    )));
                    break (DisconnectReason::Unknown, "stream ended".to_string(), true);
                }
            },
            outgoing = outbound_rx.recv() => match outgoing {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                        warn!(error = %e, "Failed to send frame");
                        shared.hub.emit(TransportEvent::Error(TransportError::new(
                            TransportErrorKind::SendFrame,
                            e.to_string(),
                        )));
                        break (DisconnectReason::Unknown, e.to_string(), false);
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break (DisconnectReason::Normal, String::new(), false);
                }
            },
            _ = tick(&mut ping) => {
                if write.send(WsMessage::Ping(Default::default())).await.is_err() {
                    debug!("Ping failed, waiting for the read side to report");
                }
            }
        }
    };

    *lock(&shared.state) = TransportState::Closed;
    lock(&shared.outbound).take();
    shared.hub.emit(TransportEvent::Disconnected {
        reason,
        message,
        server_requested,
    });
}

async fn tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn fail(shared: &Shared, err: TransportError) {
    *lock(&shared.state) = TransportState::Closed;
    lock(&shared.outbound).take();
    shared.hub.emit(TransportEvent::Error(err));
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_request(endpoint: &Endpoint) -> Result<Request, TransportError> {
    let mut request = endpoint
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| map_ws_error(&e))?;

    for (name, value) in &endpoint.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::new(
                TransportErrorKind::Unknown,
                format!("invalid header name {name}: {e}"),
            )
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            TransportError::new(
                TransportErrorKind::Unknown,
                format!("invalid value for header {name}"),
            )
        })?;
        request.headers_mut().insert(header_name, header_value);
    }

    Ok(request)
}

fn map_ws_error(err: &WsError) -> TransportError {
    match err {
        WsError::Http(response) => TransportError::new(
            TransportErrorKind::UpgradeRejected(response.status().as_u16()),
            format!("upgrade rejected with HTTP {}", response.status()),
        ),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportError::new(TransportErrorKind::RemoteClosed, err.to_string())
        }
        WsError::Io(e) if e.to_string().contains("lookup") => {
            TransportError::new(TransportErrorKind::DnsFailure, e.to_string())
        }
        WsError::Io(e) => TransportError::new(TransportErrorKind::ConnectionFailure, e.to_string()),
        WsError::Url(e) => TransportError::new(TransportErrorKind::ConnectionFailure, e.to_string()),
        other => TransportError::new(TransportErrorKind::WebSocket, other.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
