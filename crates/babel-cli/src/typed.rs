//! Recognizer stand-in fed from typed lines.
//!
//! The real speech engine lives outside this workspace. This one turns
//! `/say` lines into recognition results so the session can be driven
//! from a terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use babel_conversation::{
    ConversationError, EventHub, Recognizer, RecognizerEvent, RecognizerResult,
    RecognizerSettings, SubscriptionId,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct TypedRecognizer {
    hub: EventHub<RecognizerEvent>,
    language: Mutex<String>,
    connected: AtomicBool,
    recognizing: AtomicBool,
}

impl TypedRecognizer {
    pub fn new() -> Self {
        Self {
            hub: EventHub::new(),
            language: Mutex::new(String::new()),
            connected: AtomicBool::new(false),
            recognizing: AtomicBool::new(false),
        }
    }

    /// Report `text` as one utterance. Returns false while not transcribing.
    pub fn say(&self, text: &str) -> bool {
        if !self.recognizing.load(Ordering::SeqCst) {
            return false;
        }
        let language = self
            .language
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default();
        let result = |text: &str| RecognizerResult {
            text: text.to_string(),
            language: language.clone(),
            translations: Vec::new(),
        };

        // Word-by-word partials, then the final.
        let words: Vec<&str> = text.split_whitespace().collect();
        for n in 1..words.len() {
            self.hub
                .emit(RecognizerEvent::Recognizing(result(&words[..n].join(" "))));
        }
        self.hub.emit(RecognizerEvent::Recognized(result(text)));
        true
    }
}

impl Default for TypedRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Recognizer for TypedRecognizer {
    async fn configure(&self, settings: RecognizerSettings) -> Result<(), ConversationError> {
        debug!(
            language = %settings.language,
            region = %settings.speech_region,
            "Recognizer configured"
        );
        if let Ok(mut language) = self.language.lock() {
            *language = settings.language;
        }
        Ok(())
    }

    async fn open_connection(&self) -> Result<(), ConversationError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            self.hub.emit(RecognizerEvent::Connected);
        }
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), ConversationError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.recognizing.store(false, Ordering::SeqCst);
            self.hub.emit(RecognizerEvent::Disconnected);
        }
        Ok(())
    }

    async fn start_continuous(&self) -> Result<(), ConversationError> {
        if !self.recognizing.swap(true, Ordering::SeqCst) {
            self.hub.emit(RecognizerEvent::SessionStarted);
        }
        Ok(())
    }

    async fn stop_continuous(&self) -> Result<(), ConversationError> {
        if self.recognizing.swap(false, Ordering::SeqCst) {
            self.hub.emit(RecognizerEvent::SessionStopped);
        }
        Ok(())
    }

    async fn update_authorization_token(
        &self,
        _token: &str,
        region: &str,
    ) -> Result<(), ConversationError> {
        info!(region = %region, "Recognizer token refreshed");
        Ok(())
    }

    fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<RecognizerEvent>) {
        self.hub.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id);
    }
}
