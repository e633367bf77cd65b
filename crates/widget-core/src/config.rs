//! Widget configuration
//!
//! [`WidgetConfig`] collects every tunable the call widget uses: where the
//! session backend lives, how long to wait for the RTC library, how attempt
//! identifiers are generated, and how the remote agent is recognized.
//!
//! ```rust
//! use voicewidget_core::WidgetConfig;
//! use std::time::Duration;
//!
//! let config = WidgetConfig::new("https://shop.example.com")
//!     .with_readiness_deadline(Duration::from_secs(5))
//!     .with_brand_name("Zen");
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.readiness.deadline(), Duration::from_secs(5));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WidgetError, WidgetResult};
use crate::rtc::{ConnectionOptions, ParticipantInfo};

/// Names the RTC library has historically been published under, highest priority first
pub const DEFAULT_LIBRARY_CANDIDATES: [&str; 4] = ["LivekitClient", "LiveKitClient", "livekit", "LiveKit"];

/// Main widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Base URL of the storefront backend (`/api/*` endpoints)
    pub backend_url: String,
    /// Timeout for a single backend round trip
    pub http_timeout_ms: u64,
    /// RTC library readiness detection
    pub readiness: ReadinessConfig,
    /// Options passed to the RTC connection constructor
    pub connection: ConnectionOptions,
    /// Attempt identifier generation
    pub identity: IdentityConfig,
    /// Remote agent recognition and status wording
    pub agent: AgentConfig,
}

/// Readiness detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Give up after this long
    pub deadline_ms: u64,
    /// Re-probe this often
    pub poll_interval_ms: u64,
    /// Namespace names to probe, highest priority first
    pub candidates: Vec<String>,
}

impl ReadinessConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 10_000,
            poll_interval_ms: 100,
            candidates: DEFAULT_LIBRARY_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Prefixes for per-attempt identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub room_prefix: String,
    pub participant_prefix: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            room_prefix: "shop-".to_string(),
            participant_prefix: "Customer-".to_string(),
        }
    }
}

/// How the remote conversational agent presents itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent identities start with this prefix
    pub identity_prefix: String,
    /// Display name the agent publishes
    pub display_name: String,
    /// Name used in status text ("Connecting to ...")
    pub brand_name: String,
}

impl AgentConfig {
    /// Whether a joining participant is the remote agent
    pub fn is_agent(&self, participant: &ParticipantInfo) -> bool {
        participant.identity.starts_with(&self.identity_prefix)
            || participant.name.as_deref() == Some(self.display_name.as_str())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity_prefix: "shop-whisper".to_string(),
            display_name: "shop-whisper-agent".to_string(),
            brand_name: "Shop Whisper".to_string(),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            http_timeout_ms: 10_000,
            readiness: ReadinessConfig::default(),
            connection: ConnectionOptions::default(),
            identity: IdentityConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl WidgetConfig {
    /// Create a configuration pointing at `backend_url` with default settings
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Default::default()
        }
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_readiness_deadline(mut self, deadline: Duration) -> Self {
        self.readiness.deadline_ms = deadline.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.readiness.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Replace the namespace names probed for the RTC library
    pub fn with_library_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readiness.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection = options;
        self
    }

    pub fn with_agent(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_brand_name(mut self, brand: impl Into<String>) -> Self {
        self.agent.brand_name = brand.into();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Check the configuration for values the widget cannot work with
    pub fn validate(&self) -> WidgetResult<()> {
        if self.backend_url.trim().is_empty() {
            return Err(WidgetError::config("backend URL is required"));
        }

        if self.readiness.poll_interval_ms == 0 {
            return Err(WidgetError::config("readiness poll interval must be non-zero"));
        }

        if self.readiness.poll_interval_ms > self.readiness.deadline_ms {
            return Err(WidgetError::config(format!(
                "readiness poll interval ({} ms) exceeds the deadline ({} ms)",
                self.readiness.poll_interval_ms, self.readiness.deadline_ms
            )));
        }

        if self.readiness.candidates.is_empty() {
            return Err(WidgetError::config("at least one library candidate name is required"));
        }

        Ok(())
    }
}
