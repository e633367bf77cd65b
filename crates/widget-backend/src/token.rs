//! RTC access token issuance
//!
//! Tokens are HS256 JWTs signed with the RTC service's API secret. The API
//! key is the issuer, the participant the subject, and a video grant scopes
//! the token to one room.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, MAX_TOKEN_TTL_SECS};
use crate::error::{BackendError, BackendResult};

/// Room permissions carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room_join: bool,
    pub room: String,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

impl VideoGrant {
    /// Join `room` with publish and subscribe rights
    pub fn join(room: impl Into<String>) -> Self {
        Self {
            room_join: true,
            room: room.into(),
            can_publish: true,
            can_subscribe: true,
        }
    }
}

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,  // API key
    pub sub: String,  // Participant identity
    pub name: String, // Display name
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub video: VideoGrant,
}

/// Access token issuer
pub struct AccessTokenIssuer {
    api_key: String,
    encoding_key: EncodingKey,
    header: Header,
    ttl: Duration,
}

impl AccessTokenIssuer {
    pub fn new(api_key: impl Into<String>, api_secret: &str, ttl_secs: u64) -> Self {
        Self {
            api_key: api_key.into(),
            encoding_key: EncodingKey::from_secret(api_secret.as_bytes()),
            header: Header::new(Algorithm::HS256),
            ttl: Duration::seconds(ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64),
        }
    }

    /// Build an issuer from the configured API credentials
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let (key, secret) = config.api_credentials().ok_or(BackendError::MissingCredentials)?;
        Ok(Self::new(key, secret, config.token_ttl_secs))
    }

    /// Mint a token letting `participant` join `room`
    pub fn issue(&self, room: &str, participant: &str) -> BackendResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            iss: self.api_key.clone(),
            sub: participant.to_string(),
            name: participant.to_string(),
            nbf: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: participant.to_string(),
            video: VideoGrant::join(room),
        };

        Ok(encode(&self.header, &claims, &self.encoding_key)?)
    }
}
