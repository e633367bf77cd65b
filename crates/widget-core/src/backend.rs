//! Session backend client
//!
//! Two requests stand between a user click and an RTC connection: one for a
//! connection credential and one asking the backend to dispatch the remote
//! agent into the room. Both are single POSTs with no retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::WidgetConfig;
use crate::error::{WidgetError, WidgetResult};

/// Connection credential issued for one attempt
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque access token
    pub token: String,
    /// RTC service URL to connect to
    #[serde(default)]
    pub url: String,
    /// Room name as confirmed by the server
    pub room_name: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("url", &self.url)
            .field("room_name", &self.room_name)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    room_name: &'a str,
    participant_name: &'a str,
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    room_name: &'a str,
}

/// `{error}` body returned by the backend on failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// The backend the call session talks to
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Obtain a connection credential for `room` as `participant`
    async fn request_credential(&self, room: &str, participant: &str) -> WidgetResult<Credential>;

    /// Ask the backend to dispatch the remote agent into `room_name`
    async fn activate_agent(&self, room_name: &str) -> WidgetResult<()>;
}

/// [`SessionBackend`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpSessionBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSessionBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> WidgetResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WidgetError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url))
    }

    /// Use an existing client (shared connection pool)
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn from_config(config: &WidgetConfig) -> WidgetResult<Self> {
        Self::new(config.backend_url.clone(), config.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn request_credential(&self, room: &str, participant: &str) -> WidgetResult<Credential> {
        debug!("Requesting access token for room {} as {}", room, participant);

        let res = self
            .http
            .post(self.endpoint("/api/token"))
            .json(&TokenRequest {
                room_name: room,
                participant_name: participant,
            })
            .send()
            .await
            .map_err(|e| WidgetError::credential(e.to_string()))?;

        if !res.status().is_success() {
            return Err(WidgetError::credential(failure_message(res).await));
        }

        let credential: Credential = res
            .json()
            .await
            .map_err(|e| WidgetError::credential(format!("invalid token response: {e}")))?;

        if credential.url.is_empty() {
            return Err(WidgetError::credential("connection URL not configured"));
        }

        info!("Access token issued for room {}", credential.room_name);
        Ok(credential)
    }

    async fn activate_agent(&self, room_name: &str) -> WidgetResult<()> {
        let res = self
            .http
            .post(self.endpoint("/api/start-agent"))
            .json(&AgentRequest { room_name })
            .send()
            .await
            .map_err(|e| WidgetError::agent_activation(e.to_string()))?;

        if !res.status().is_success() {
            return Err(WidgetError::agent_activation(failure_message(res).await));
        }

        debug!("Agent activation accepted for room {}", room_name);
        Ok(())
    }
}

/// Server `{error}` message of a failed response, falling back to the status text
pub(crate) async fn failure_message(res: Response) -> String {
    let status = res.status();
    match res.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(message) }) if !message.is_empty() => message,
        _ => status_text(status),
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}
