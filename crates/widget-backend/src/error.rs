//! Error types for the storefront backend

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in the storefront backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// API key or secret missing, so no access token can be minted
    #[error("LiveKit API key and secret must be configured")]
    MissingCredentials,

    /// The request lacked a required field
    #[error("{0}")]
    BadRequest(String),

    /// Inventory file does not exist
    #[error("Inventory file not found: {}", .0.display())]
    InventoryNotFound(PathBuf),

    /// Inventory file could not be read or parsed
    #[error("Failed to read inventory: {0}")]
    Inventory(String),

    /// Token signing failed
    #[error("Token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InventoryNotFound(_) => StatusCode::NOT_FOUND,
            Self::MissingCredentials | Self::Inventory(_) | Self::Token(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<config::ConfigError> for BackendError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
