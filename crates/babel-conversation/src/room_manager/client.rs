//! REST client for creating, joining and leaving rooms.

use babel_common::ErrorCode;
use tracing::{debug, info, warn};

use super::types::{ConversationArgs, CreateConversationArgs, RoomManagerConfig, RoomResponse};
use crate::error::ConversationError;

const API_VERSION: &str = "2.0";

/// Stateless room REST client. No retries happen here.
pub struct RoomManager {
    config: RoomManagerConfig,
    http: reqwest::Client,
}

impl RoomManager {
    pub fn new(config: RoomManagerConfig) -> Result<Self, ConversationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConversationError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Create a room, or join `room_code` when given.
    ///
    /// `room_pin` takes precedence over `args.host_code` as the `hostCode`
    /// parameter.
    pub async fn create_or_join(
        &self,
        args: &CreateConversationArgs,
        room_code: Option<&str>,
        room_pin: Option<&str>,
    ) -> Result<ConversationArgs, ConversationError> {
        let room_code = room_code.filter(|c| !c.is_empty());
        let region = args.region.as_deref().filter(|r| !r.is_empty());
        let auth_token = args.auth_token.as_deref().filter(|t| !t.is_empty());
        let subscription_key = args.subscription_key.as_deref().filter(|k| !k.is_empty());

        if region.is_none() && room_code.is_none() {
            return Err(ConversationError::InvalidArgument(
                "a region is required when creating a room".into(),
            ));
        }
        if auth_token.is_some() && subscription_key.is_some() {
            return Err(ConversationError::InvalidArgument(
                "supply either an auth token or a subscription key, not both".into(),
            ));
        }
        if auth_token.is_none() && subscription_key.is_none() && room_code.is_none() {
            return Err(ConversationError::InvalidArgument(
                "an auth token or subscription key is required when creating a room".into(),
            ));
        }
        if args.nickname.is_empty() {
            return Err(ConversationError::InvalidArgument(
                "nickname cannot be empty".into(),
            ));
        }

        let mut query: Vec<(&str, &str)> = vec![
            ("api-version", API_VERSION),
            ("language", args.language.as_str()),
            ("nickname", args.nickname.as_str()),
        ];
        query.extend(args.translate_to.iter().map(|lang| ("translateTo", lang.as_str())));
        if let Some(code) = room_code {
            query.push(("roomId", code));
        }
        if let Some(host_code) = room_pin
            .filter(|p| !p.is_empty())
            .or(args.host_code.as_deref().filter(|c| !c.is_empty()))
        {
            query.push(("hostCode", host_code));
        }
        if let Some(voice) = args.tts_voice.as_deref().filter(|v| !v.is_empty()) {
            query.push(("voice", voice));
            query.push(("format", args.tts_format.as_str()));
        }

        let mut request = self.http.post(&self.config.endpoint).query(&query);
        if room_code.is_none() {
            if let Some(region) = region {
                request = request.header("region", region);
            }
        }
        if let Some(token) = auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(key) = subscription_key {
            request = request.header("Ocp-Apim-Subscription-Key", key);
        }
        if let Some(app_id) = args.client_app_id.as_deref() {
            request = request.header("X-ClientAppId", app_id);
        }
        if let Some(correlation_id) = args.correlation_id.as_deref() {
            request = request.header("X-ClientTraceId", correlation_id);
        }

        debug!(
            joining = room_code.is_some(),
            language = %args.language,
            targets = args.translate_to.len(),
            "Room create/join request"
        );

        let response = request
            .send()
            .await
            .map_err(|e| ConversationError::Network(e.to_string()))?;
        let body = check_status(response).await?;

        let parsed: RoomResponse = serde_json::from_str(&body)
            .map_err(|e| ConversationError::MalformedResponse(e.to_string()))?;
        let args = ConversationArgs::from(parsed);

        info!(
            room_code = %args.room_code,
            participant_id = %args.participant_id,
            "Joined conversation room"
        );
        Ok(args)
    }

    /// Delete this participant's session on the service.
    pub async fn leave(&self, session_token: &str) -> Result<(), ConversationError> {
        if session_token.is_empty() {
            return Err(ConversationError::InvalidArgument(
                "session token cannot be empty".into(),
            ));
        }

        let response = self
            .http
            .delete(&self.config.endpoint)
            .query(&[("api-version", API_VERSION), ("token", session_token)])
            .send()
            .await
            .map_err(|e| ConversationError::Network(e.to_string()))?;
        check_status(response).await?;

        info!("Left conversation room");
        Ok(())
    }
}

/// Return the body of a successful response, or map the status onto the
/// error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<String, ConversationError> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let code = ErrorCode::from_http_status(status.as_u16());
        warn!(status = status.as_u16(), code = %code, "Room request failed");
        return Err(ConversationError::Http {
            status: status.as_u16(),
            code,
            message: text,
        });
    }
    Ok(text)
}
