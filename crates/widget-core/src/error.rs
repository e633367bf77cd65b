//! Error types for the voice widget

use thiserror::Error;

/// Result type for widget operations
pub type WidgetResult<T> = Result<T, WidgetError>;

/// Why a call attempt ended in the `Failed` state
///
/// Each kind points at a different culprit: the page environment, the
/// session backend, the RTC service, or the user's audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The RTC client library never became available
    LibraryUnavailable,
    /// The backend rejected or failed to issue a connection credential
    Credential,
    /// The handshake against the RTC service failed
    Connect,
    /// Microphone permission was denied or no device is available
    Microphone,
    /// Anything outside the call handshake (configuration, catalog)
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LibraryUnavailable => write!(f, "library-unavailable"),
            Self::Credential => write!(f, "credential"),
            Self::Connect => write!(f, "connect"),
            Self::Microphone => write!(f, "microphone"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors that can occur in the voice widget
#[derive(Debug, Error)]
pub enum WidgetError {
    /// The RTC client library did not appear before the readiness deadline
    #[error("RTC client library failed to load within {waited_ms} ms")]
    LibraryUnavailable { waited_ms: u64 },

    /// Credential request failed
    #[error("Failed to get access token: {message}")]
    Credential { message: String },

    /// RTC connection could not be constructed or connected
    #[error("Failed to connect to room: {message}")]
    Connect { message: String },

    /// Local microphone could not be enabled
    #[error("Failed to enable microphone: {message}")]
    Microphone { message: String },

    /// Remote agent activation failed (never fatal to an attempt)
    #[error("Agent activation failed: {message}")]
    AgentActivation { message: String },

    /// Product listing could not be loaded
    #[error("{message}")]
    Catalog { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl WidgetError {
    /// Create a credential error
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Create a connect error
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Create a microphone error
    pub fn microphone(message: impl Into<String>) -> Self {
        Self::Microphone {
            message: message.into(),
        }
    }

    /// Create an agent activation error
    pub fn agent_activation(message: impl Into<String>) -> Self {
        Self::AgentActivation {
            message: message.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// The failure kind recorded in the session state for this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::LibraryUnavailable { .. } => FailureKind::LibraryUnavailable,
            Self::Credential { .. } => FailureKind::Credential,
            Self::Connect { .. } => FailureKind::Connect,
            Self::Microphone { .. } => FailureKind::Microphone,
            Self::AgentActivation { .. } | Self::Catalog { .. } | Self::Configuration { .. } => {
                FailureKind::Internal
            }
        }
    }

    /// Whether this error aborts a call attempt
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AgentActivation { .. })
    }
}
