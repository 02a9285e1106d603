//! Conversation service endpoints and credentials.

use serde::{Deserialize, Serialize};

/// Default conversation service host.
pub const DEFAULT_HOST: &str = "dev.microsofttranslator.com";

/// Where the conversation service lives and how to authenticate to it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    /// Overrides `https://<host>/capito/room`.
    pub rest_endpoint: Option<String>,
    /// Overrides `wss://<host>/capito/translate`.
    pub websocket_endpoint: Option<String>,
    /// Speech service region. Required when creating a room.
    pub region: String,
    pub subscription_key: Option<String>,
    pub auth_token: Option<String>,
    pub client_app_id: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            rest_endpoint: None,
            websocket_endpoint: None,
            region: String::new(),
            subscription_key: None,
            auth_token: None,
            client_app_id: None,
        }
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("rest_endpoint", &self.rest_endpoint)
            .field("websocket_endpoint", &self.websocket_endpoint)
            .field("region", &self.region)
            .field(
                "subscription_key",
                &self.subscription_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("client_app_id", &self.client_app_id)
            .finish()
    }
}

impl ServiceConfig {
    pub fn rest_url(&self) -> String {
        self.rest_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}/capito/room", self.host))
    }

    pub fn websocket_url(&self) -> String {
        self.websocket_endpoint
            .clone()
            .unwrap_or_else(|| format!("wss://{}/capito/translate", self.host))
    }
}
