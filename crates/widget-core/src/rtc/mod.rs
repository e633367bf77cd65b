//! RTC collaborator contract
//!
//! The widget drives a real-time communication client library it does not
//! implement. This module describes the capabilities it relies on:
//!
//! ```text
//! LibraryNamespace ──lookup(name)──► RtcLibrary ──create_connection──► RtcConnection
//!                                                                        │
//!                              subscribe(sink) ◄── RtcEvent stream ◄─────┘
//! ```
//!
//! [`GlobalNamespace`] and [`MemoryRtcLibrary`] are in-process
//! implementations used for headless operation and tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;
pub mod namespace;

pub use memory::{CallJournal, MemoryBehavior, MemoryConnection, MemoryRtcLibrary, MemoryTrack, RtcCall};
pub use namespace::{GlobalNamespace, LibraryNamespace};

/// Shared reference to the RTC library entry object
///
/// Not owned by the widget; it lives as long as the page does.
pub type LibraryHandle = Arc<dyn RtcLibrary>;

/// Errors reported by the RTC collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RtcError {
    /// The connection object could not be constructed
    #[error("connection construction failed: {0}")]
    Construction(String),
    /// Connecting to the RTC service failed
    #[error("connect failed: {0}")]
    Connect(String),
    /// A local media device could not be used
    #[error("media device error: {0}")]
    Device(String),
    /// Disconnecting failed
    #[error("disconnect failed: {0}")]
    Disconnect(String),
}

impl RtcError {
    /// The collaborator-provided message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Construction(m) | Self::Connect(m) | Self::Device(m) | Self::Disconnect(m) => m,
        }
    }
}

/// Fixed options passed to the connection constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Adaptive bitrate streaming
    pub adaptive_stream: bool,
    /// Selective forwarding of published layers
    pub dynacast: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            adaptive_stream: true,
            dynacast: true,
        }
    }
}

/// Identifier of one event subscription on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Remote participant as reported by the RTC library
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParticipantInfo {
    pub identity: String,
    pub name: Option<String>,
    pub metadata: Option<String>,
}

impl ParticipantInfo {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Media kind of a remote track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
    Unknown,
}

/// A remote media track delivered by the RTC library
pub trait RemoteTrack: Send + Sync {
    /// Track identifier assigned by the RTC service
    fn sid(&self) -> &str;

    /// Media kind discriminator
    fn kind(&self) -> TrackKind;

    /// Produce a playable sink bound to this track
    fn attach(&self) -> Box<dyn MediaSink>;
}

/// Playable output element produced by [`RemoteTrack::attach`]
pub trait MediaSink: Send + Sync {
    fn track_sid(&self) -> &str;

    fn autoplay(&self) -> bool;

    fn set_autoplay(&mut self, autoplay: bool);

    fn plays_inline(&self) -> bool;

    fn set_plays_inline(&mut self, inline: bool);

    /// Stop playback and release the track binding
    fn detach(&mut self);
}

/// Lifecycle events emitted by a connection
#[derive(Clone)]
pub enum RtcEvent {
    /// The connection reached the RTC service
    Connected,
    /// The connection is gone (network loss, remote hangup, kicked, or local disconnect)
    Disconnected { reason: Option<String> },
    /// Raw connection state change, informational only
    StateChanged(String),
    /// A remote participant joined the room
    ParticipantConnected(ParticipantInfo),
    /// A remote track became available
    TrackSubscribed {
        track: Arc<dyn RemoteTrack>,
        participant: ParticipantInfo,
    },
}

impl std::fmt::Debug for RtcEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected { reason } => f.debug_struct("Disconnected").field("reason", reason).finish(),
            Self::StateChanged(state) => f.debug_tuple("StateChanged").field(state).finish(),
            Self::ParticipantConnected(p) => f.debug_tuple("ParticipantConnected").field(p).finish(),
            Self::TrackSubscribed { track, participant } => f
                .debug_struct("TrackSubscribed")
                .field("sid", &track.sid())
                .field("kind", &track.kind())
                .field("participant", participant)
                .finish(),
        }
    }
}

/// Entry object of the RTC client library
pub trait RtcLibrary: Send + Sync {
    /// Library version string, if the library publishes one
    fn version(&self) -> Option<&str> {
        None
    }

    /// Whether the connection constructor is present
    ///
    /// A library object without it is treated as not loaded yet.
    fn supports_connections(&self) -> bool;

    /// Construct a new, unconnected connection object
    fn create_connection(&self, options: ConnectionOptions) -> Result<Arc<dyn RtcConnection>, RtcError>;
}

/// One connection to an RTC room
#[async_trait]
pub trait RtcConnection: Send + Sync {
    /// Register an event sink; events are delivered until [`unsubscribe`](Self::unsubscribe)
    fn subscribe(&self, sink: mpsc::UnboundedSender<RtcEvent>) -> SubscriptionId;

    /// Remove a previously registered sink
    fn unsubscribe(&self, id: SubscriptionId);

    async fn connect(&self, url: &str, token: &str) -> Result<(), RtcError>;

    async fn disconnect(&self) -> Result<(), RtcError>;

    /// Enable or disable the local participant's microphone
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), RtcError>;
}
