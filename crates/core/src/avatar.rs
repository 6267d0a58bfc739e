//! Avatar rendering service client.
//!
//! The avatar joins the room as its own participant using a token we mint,
//! renders the persona, lip-syncs to the speech we route to it, and publishes
//! its audio and video tracks directly into the room.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default REST endpoint for the avatar service.
pub const TAVUS_API_BASE: &str = "https://tavusapi.com/v2";
/// Identity the avatar participant joins the room with.
pub const AVATAR_IDENTITY: &str = "tavus-avatar-agent";
/// Display name of the avatar participant.
pub const AVATAR_DISPLAY_NAME: &str = "Tavus-avatar-agent";

#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    #[error("Avatar service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Avatar service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Which replica and persona to render, and where to publish them.
#[derive(Debug, Clone)]
pub struct AvatarSessionRequest {
    pub replica_id: String,
    pub persona_id: String,
    pub livekit_url: String,
    pub livekit_token: String,
}

#[derive(Serialize, Debug)]
struct CreateConversationBody<'a> {
    replica_id: &'a str,
    persona_id: &'a str,
    properties: ConversationProperties<'a>,
}

#[derive(Serialize, Debug)]
struct ConversationProperties<'a> {
    livekit_ws_url: &'a str,
    livekit_room_token: &'a str,
}

/// A running avatar conversation.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AvatarConversation {
    pub conversation_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Starts and stops avatar sessions.
#[async_trait]
pub trait AvatarService: Send + Sync {
    async fn start(&self, request: &AvatarSessionRequest) -> Result<AvatarConversation, AvatarError>;
    async fn end(&self, conversation_id: &str) -> Result<(), AvatarError>;
}

/// `AvatarService` backed by the Tavus conversations API.
pub struct TavusClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl TavusClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: TAVUS_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AvatarError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AvatarError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl AvatarService for TavusClient {
    async fn start(&self, request: &AvatarSessionRequest) -> Result<AvatarConversation, AvatarError> {
        let body = CreateConversationBody {
            replica_id: &request.replica_id,
            persona_id: &request.persona_id,
            properties: ConversationProperties {
                livekit_ws_url: &request.livekit_url,
                livekit_room_token: &request.livekit_token,
            },
        };

        let response = self
            .http
            .post(self.url("conversations"))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let conversation: AvatarConversation = Self::check(response).await?.json().await?;

        info!(
            conversation_id = %conversation.conversation_id,
            replica_id = %request.replica_id,
            "Avatar conversation started"
        );
        Ok(conversation)
    }

    async fn end(&self, conversation_id: &str) -> Result<(), AvatarError> {
        let response = self
            .http
            .post(self.url(&format!("conversations/{}/end", conversation_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(response).await?;
        info!(%conversation_id, "Avatar conversation ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_nests_livekit_properties() {
        let body = CreateConversationBody {
            replica_id: "r1",
            persona_id: "p1",
            properties: ConversationProperties {
                livekit_ws_url: "wss://example.livekit.cloud",
                livekit_room_token: "jwt",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["replica_id"], "r1");
        assert_eq!(json["persona_id"], "p1");
        assert_eq!(
            json["properties"]["livekit_ws_url"],
            "wss://example.livekit.cloud"
        );
        assert_eq!(json["properties"]["livekit_room_token"], "jwt");
    }

    #[test]
    fn conversation_response_tolerates_extra_fields() {
        let json = r#"{"conversation_id":"c123","status":"active","conversation_url":"https://x"}"#;
        let conversation: AvatarConversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.conversation_id, "c123");
        assert_eq!(conversation.status.as_deref(), Some("active"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = TavusClient::new("key").with_api_base("http://localhost:9000/v2/");
        assert_eq!(client.url("conversations"), "http://localhost:9000/v2/conversations");
    }
}
