//! REST API for the voice widget
//!
//! - `POST /api/token` mints an access token for one participant in one room
//! - `POST /api/start-agent` acknowledges an agent activation request
//! - `GET /api/products` serves the inventory file

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::inventory::load_inventory;
use crate::token::AccessTokenIssuer;

pub const DEFAULT_PARTICIPANT_NAME: &str = "Customer";
pub const AGENT_READY_MESSAGE: &str = "Agent worker should be running. Agent will auto-join when participant connects.";

// API State
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<BackendConfig>,
    /// `None` when no API credentials are configured
    pub issuer: Option<Arc<AccessTokenIssuer>>,
}

impl ApiState {
    pub fn new(config: BackendConfig) -> Self {
        let issuer = match AccessTokenIssuer::from_config(&config) {
            Ok(issuer) => Some(Arc::new(issuer)),
            Err(e) => {
                warn!("Token endpoint disabled: {}", e);
                None
            }
        };
        Self {
            config: Arc::new(config),
            issuer,
        }
    }
}

// Request/Response types
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub room_name: Option<String>,
    pub participant_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub url: String,
    pub room_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartAgentRequest {
    pub room_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartAgentResponse {
    pub status: String,
    pub room_name: String,
    pub message: String,
}

/// Create the REST API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/token", post(issue_token))
        .route("/api/start-agent", post(start_agent))
        .route("/api/products", get(list_products))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn issue_token(
    State(state): State<ApiState>,
    body: Option<Json<TokenRequest>>,
) -> BackendResult<Json<TokenResponse>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let room_name = request
        .room_name
        .unwrap_or_else(|| format!("shop-{}", &Uuid::new_v4().simple().to_string()[..8]));
    let participant = request
        .participant_name
        .unwrap_or_else(|| DEFAULT_PARTICIPANT_NAME.to_string());

    let issuer = state.issuer.as_ref().ok_or(BackendError::MissingCredentials)?;
    let token = issuer.issue(&room_name, &participant)?;
    info!("Issued access token for {} in room {}", participant, room_name);

    Ok(Json(TokenResponse {
        token,
        url: state.config.livekit_url.clone(),
        room_name,
    }))
}

async fn start_agent(body: Option<Json<StartAgentRequest>>) -> BackendResult<Json<StartAgentResponse>> {
    let room_name = body
        .and_then(|Json(b)| b.room_name)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BackendError::bad_request("room_name is required"))?;

    info!("Agent requested for room {}", room_name);
    Ok(Json(StartAgentResponse {
        status: "ready".to_string(),
        room_name,
        message: AGENT_READY_MESSAGE.to_string(),
    }))
}

async fn list_products(State(state): State<ApiState>) -> BackendResult<Json<Value>> {
    Ok(Json(load_inventory(&state.config.inventory_path).await?))
}
