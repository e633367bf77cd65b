//! Configuration for the storefront backend
//!
//! Values come from the process environment (after `.env` has been read):
//!
//! | Variable             | Default          |
//! |----------------------|------------------|
//! | `LIVEKIT_URL`        | empty            |
//! | `LIVEKIT_API_KEY`    | unset            |
//! | `LIVEKIT_API_SECRET` | unset            |
//! | `BIND_ADDRESS`       | `0.0.0.0:5000`   |
//! | `INVENTORY_PATH`     | `inventory.json` |
//! | `TOKEN_TTL_SECS`     | `3600`           |

use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{BackendError, BackendResult};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";
pub const DEFAULT_INVENTORY_PATH: &str = "inventory.json";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
/// Longest token lifetime accepted: 30 days
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 3600;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// RTC service URL handed to clients with their token
    pub livekit_url: String,
    pub livekit_api_key: Option<String>,
    pub livekit_api_secret: Option<String>,
    pub bind_address: String,
    pub inventory_path: PathBuf,
    /// Lifetime of issued access tokens
    pub token_ttl_secs: u64,
}

impl BackendConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> BackendResult<Self> {
        Self::load(Environment::default())
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: config::Map<String, String>) -> BackendResult<Self> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(env: Environment) -> BackendResult<Self> {
        let config: Self = Config::builder()
            .set_default("livekit_url", "")?
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("inventory_path", DEFAULT_INVENTORY_PATH)?
            .set_default("token_ttl_secs", DEFAULT_TOKEN_TTL_SECS)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BackendResult<()> {
        if self.token_ttl_secs == 0 {
            return Err(BackendError::config("TOKEN_TTL_SECS must be non-zero"));
        }
        if self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(BackendError::config(format!(
                "TOKEN_TTL_SECS must be at most {MAX_TOKEN_TTL_SECS}"
            )));
        }
        Ok(())
    }

    /// API key and secret, when both are configured and non-empty
    pub fn api_credentials(&self) -> Option<(&str, &str)> {
        let key = self.livekit_api_key.as_deref().filter(|k| !k.is_empty())?;
        let secret = self.livekit_api_secret.as_deref().filter(|s| !s.is_empty())?;
        Some((key, secret))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            livekit_url: String::new(),
            livekit_api_key: None,
            livekit_api_secret: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            inventory_path: PathBuf::from(DEFAULT_INVENTORY_PATH),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}
