//! Room access tokens.
//!
//! Every participant we introduce (browser users, the agent itself, the
//! avatar) joins with a short-lived JWT signed with the LiveKit API secret.

use std::fmt;
use std::time::Duration;

use livekit_api::access_token::{AccessToken, AccessTokenError, VideoGrants};

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("room and identity are required")]
    MissingRoomOrIdentity,
    #[error("Failed to sign access token: {0}")]
    Signing(#[from] AccessTokenError),
}

/// Mints room join tokens with publish, subscribe and data permissions.
#[derive(Clone)]
pub struct TokenIssuer {
    api_key: String,
    api_secret: String,
    ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issues a join token for `identity` in `room`. Both are trimmed and must
    /// be non-empty.
    pub fn join_token(
        &self,
        room: &str,
        identity: &str,
        display_name: Option<&str>,
    ) -> Result<String, TokenError> {
        let room = room.trim();
        let identity = identity.trim();
        if room.is_empty() || identity.is_empty() {
            return Err(TokenError::MissingRoomOrIdentity);
        }

        let token = AccessToken::with_api_key(&self.api_key, &self.api_secret)
            .with_identity(identity)
            .with_name(display_name.unwrap_or(identity))
            .with_grants(VideoGrants {
                room_join: true,
                room: room.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(self.ttl);

        Ok(token.to_jwt()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
    use serde::Deserialize;

    const KEY: &str = "devkey";
    const SECRET: &str = "secret-secret-secret-secret-secret";

    #[derive(Deserialize)]
    struct Claims {
        sub: String,
        name: String,
        exp: u64,
        nbf: u64,
        video: VideoClaims,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct VideoClaims {
        room: String,
        room_join: bool,
        can_publish: bool,
        can_subscribe: bool,
        can_publish_data: bool,
    }

    fn claims(token: &str) -> Claims {
        let validation = Validation::new(Algorithm::HS256);
        let key = DecodingKey::from_secret(SECRET.as_bytes());
        decode::<Claims>(token, &key, &validation)
            .expect("token should verify")
            .claims
    }

    #[test]
    fn join_token_carries_room_grants() {
        let issuer = TokenIssuer::new(KEY, SECRET);
        let token = issuer.join_token(" demo-room ", " user-1 ", None).unwrap();

        let claims = claims(&token);
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.name, "user-1");
        assert_eq!(claims.video.room, "demo-room");
        assert!(claims.video.room_join);
        assert!(claims.video.can_publish);
        assert!(claims.video.can_subscribe);
        assert!(claims.video.can_publish_data);
    }

    #[test]
    fn display_name_is_used_when_given() {
        let issuer = TokenIssuer::new(KEY, SECRET);
        let token = issuer
            .join_token("demo-room", "tavus-avatar-agent", Some("Tavus-avatar-agent"))
            .unwrap();
        assert_eq!(claims(&token).name, "Tavus-avatar-agent");
    }

    #[test]
    fn ttl_bounds_expiry() {
        let issuer = TokenIssuer::new(KEY, SECRET).with_ttl(Duration::from_secs(60));
        let token = issuer.join_token("r", "i", None).unwrap();
        let claims = claims(&token);
        assert!(claims.exp > claims.nbf);
        assert!(claims.exp - claims.nbf <= 60);
    }

    #[test]
    fn blank_room_or_identity_is_rejected() {
        let issuer = TokenIssuer::new(KEY, SECRET);
        assert!(matches!(
            issuer.join_token("  ", "user", None),
            Err(TokenError::MissingRoomOrIdentity)
        ));
        assert!(matches!(
            issuer.join_token("room", "", None),
            Err(TokenError::MissingRoomOrIdentity)
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let issuer = TokenIssuer::new(KEY, SECRET);
        let printed = format!("{:?}", issuer);
        assert!(!printed.contains(SECRET));
        assert!(printed.contains("[REDACTED]"));
    }
}
