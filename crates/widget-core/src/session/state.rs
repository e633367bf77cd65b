use std::fmt;

use crate::error::FailureKind;

/// Call session state
///
/// One attempt moves monotonically through
/// `AwaitingLibrary → Connecting → Connected → Ended`, or drops into
/// `Failed` from either in-flight state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallState {
    /// No attempt made yet
    #[default]
    Idle,
    /// Waiting for the RTC client library
    AwaitingLibrary,
    /// Running the credential / connect / microphone handshake
    Connecting,
    /// Call is up
    Connected,
    /// Call ended by the user, the remote side, or a cancellation
    Ended,
    /// Attempt aborted
    Failed { kind: FailureKind, message: String },
}

impl CallState {
    /// Whether `start()` may begin a new attempt from this state
    pub fn accepts_start(&self) -> bool {
        matches!(self, Self::Idle) || self.is_terminal()
    }

    /// Whether an attempt is running its handshake
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::AwaitingLibrary | Self::Connecting)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the last attempt is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed { .. })
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_advance_to(&self, next: &CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Idle | Ended | Failed { .. }, AwaitingLibrary) => true,
            (AwaitingLibrary, Connecting) => true,
            (Connecting, Connected) => true,
            (AwaitingLibrary | Connecting, Failed { .. }) => true,
            (AwaitingLibrary | Connecting | Connected, Ended) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::AwaitingLibrary => write!(f, "AwaitingLibrary"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Ended => write!(f, "Ended"),
            Self::Failed { kind, .. } => write!(f, "Failed({kind})"),
        }
    }
}
