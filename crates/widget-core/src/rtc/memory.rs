//! In-memory RTC library
//!
//! Behaves like a well-mannered RTC client without any transport: connects
//! succeed (or fail) according to a [`MemoryBehavior`], events are delivered
//! to subscribers synchronously, and every call made against the library is
//! appended to a shared [`CallJournal`] so callers can assert on ordering.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{
    ConnectionOptions, MediaSink, RemoteTrack, RtcConnection, RtcError, RtcEvent, RtcLibrary,
    SubscriptionId, TrackKind,
};

/// A call made against the in-memory library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcCall {
    CreateConnection(ConnectionOptions),
    Subscribe(SubscriptionId),
    Unsubscribe(SubscriptionId),
    Connect { url: String, token: String },
    SetMicrophone(bool),
    Disconnect,
}

/// Ordered record of library calls, shared by a library and its connections
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<RtcCall>>>,
}

impl CallJournal {
    fn record(&self, call: RtcCall) {
        self.calls.lock().push(call);
    }

    /// Snapshot of every call so far, oldest first
    pub fn calls(&self) -> Vec<RtcCall> {
        self.calls.lock().clone()
    }

    /// Index of the first call matching `pred`
    pub fn position(&self, pred: impl Fn(&RtcCall) -> bool) -> Option<usize> {
        self.calls.lock().iter().position(|c| pred(c))
    }

    /// Number of calls matching `pred`
    pub fn count(&self, pred: impl Fn(&RtcCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

/// Scripted behavior for connections created by a [`MemoryRtcLibrary`]
///
/// The behavior is captured when a connection is constructed; changing it
/// later only affects new connections.
#[derive(Debug, Clone)]
pub struct MemoryBehavior {
    /// Whether the connection constructor is exposed
    pub supports_connections: bool,
    /// Fail construction with this message
    pub construction_error: Option<String>,
    /// Fail `connect` with this message
    pub connect_error: Option<String>,
    /// Fail enabling the microphone with this message
    pub microphone_error: Option<String>,
    /// Delay before `connect` settles
    pub connect_delay: Option<Duration>,
    /// Delay before `disconnect` settles
    pub disconnect_delay: Option<Duration>,
    /// Events delivered right after a successful connect
    pub events_on_connect: Vec<RtcEvent>,
}

impl Default for MemoryBehavior {
    fn default() -> Self {
        Self {
            supports_connections: true,
            construction_error: None,
            connect_error: None,
            microphone_error: None,
            connect_delay: None,
            disconnect_delay: None,
            events_on_connect: Vec::new(),
        }
    }
}

/// In-memory RTC library entry object
pub struct MemoryRtcLibrary {
    behavior: Mutex<MemoryBehavior>,
    journal: CallJournal,
    connections: Mutex<Vec<Arc<MemoryConnection>>>,
}

impl MemoryRtcLibrary {
    pub fn new() -> Self {
        Self::with_behavior(MemoryBehavior::default())
    }

    pub fn with_behavior(behavior: MemoryBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            journal: CallJournal::default(),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Adjust the behavior used for subsequently created connections
    pub fn update_behavior(&self, f: impl FnOnce(&mut MemoryBehavior)) {
        f(&mut self.behavior.lock());
    }

    pub fn journal(&self) -> CallJournal {
        self.journal.clone()
    }

    /// Every connection constructed so far
    pub fn connections(&self) -> Vec<Arc<MemoryConnection>> {
        self.connections.lock().clone()
    }

    pub fn last_connection(&self) -> Option<Arc<MemoryConnection>> {
        self.connections.lock().last().cloned()
    }
}

impl Default for MemoryRtcLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcLibrary for MemoryRtcLibrary {
    fn version(&self) -> Option<&str> {
        Some("memory")
    }

    fn supports_connections(&self) -> bool {
        self.behavior.lock().supports_connections
    }

    fn create_connection(&self, options: ConnectionOptions) -> Result<Arc<dyn RtcConnection>, RtcError> {
        let behavior = self.behavior.lock().clone();
        self.journal.record(RtcCall::CreateConnection(options));

        if let Some(message) = behavior.construction_error.clone() {
            return Err(RtcError::Construction(message));
        }

        let connection = Arc::new(MemoryConnection::new(options, behavior, self.journal.clone()));
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

/// Connection object produced by [`MemoryRtcLibrary`]
pub struct MemoryConnection {
    options: ConnectionOptions,
    behavior: MemoryBehavior,
    journal: CallJournal,
    subscribers: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<RtcEvent>)>>,
    next_subscription: AtomicU64,
    connected: AtomicBool,
    microphone: AtomicBool,
}

impl MemoryConnection {
    fn new(options: ConnectionOptions, behavior: MemoryBehavior, journal: CallJournal) -> Self {
        Self {
            options,
            behavior,
            journal,
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            microphone: AtomicBool::new(false),
        }
    }

    /// Options the connection was constructed with
    pub fn options(&self) -> ConnectionOptions {
        self.options
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn microphone_enabled(&self) -> bool {
        self.microphone.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver an event to every current subscriber, returning how many received it
    pub fn emit(&self, event: RtcEvent) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers
            .iter()
            .filter(|(_, sink)| sink.send(event.clone()).is_ok())
            .count()
    }

    /// Simulate the remote side dropping the connection
    pub fn drop_remote(&self, reason: impl Into<String>) -> usize {
        self.connected.store(false, Ordering::SeqCst);
        self.microphone.store(false, Ordering::SeqCst);
        self.emit(RtcEvent::Disconnected {
            reason: Some(reason.into()),
        })
    }
}

#[async_trait]
impl RtcConnection for MemoryConnection {
    fn subscribe(&self, sink: mpsc::UnboundedSender<RtcEvent>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.journal.record(RtcCall::Subscribe(id));
        self.subscribers.lock().push((id, sink));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.journal.record(RtcCall::Unsubscribe(id));
        self.subscribers.lock().retain(|(sub, _)| *sub != id);
    }

    async fn connect(&self, url: &str, token: &str) -> Result<(), RtcError> {
        self.journal.record(RtcCall::Connect {
            url: url.to_string(),
            token: token.to_string(),
        });

        if let Some(delay) = self.behavior.connect_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.behavior.connect_error {
            return Err(RtcError::Connect(message.clone()));
        }

        self.connected.store(true, Ordering::SeqCst);
        self.emit(RtcEvent::Connected);
        for event in &self.behavior.events_on_connect {
            self.emit(event.clone());
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RtcError> {
        self.journal.record(RtcCall::Disconnect);
        if let Some(delay) = self.behavior.disconnect_delay {
            tokio::time::sleep(delay).await;
        }
        self.microphone.store(false, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            self.emit(RtcEvent::Disconnected {
                reason: Some("client initiated".to_string()),
            });
        }
        Ok(())
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), RtcError> {
        self.journal.record(RtcCall::SetMicrophone(enabled));
        if enabled {
            if let Some(message) = &self.behavior.microphone_error {
                return Err(RtcError::Device(message.clone()));
            }
        }
        self.microphone.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Remote track for the in-memory library
pub struct MemoryTrack {
    sid: String,
    kind: TrackKind,
}

impl MemoryTrack {
    pub fn audio(sid: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            sid: sid.into(),
            kind: TrackKind::Audio,
        })
    }

    pub fn video(sid: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            sid: sid.into(),
            kind: TrackKind::Video,
        })
    }
}

impl RemoteTrack for MemoryTrack {
    fn sid(&self) -> &str {
        &self.sid
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn attach(&self) -> Box<dyn MediaSink> {
        Box::new(MemorySink {
            track_sid: self.sid.clone(),
            autoplay: false,
            plays_inline: false,
            attached: true,
        })
    }
}

/// Output element produced by [`MemoryTrack::attach`]
#[derive(Debug)]
pub struct MemorySink {
    track_sid: String,
    autoplay: bool,
    plays_inline: bool,
    attached: bool,
}

impl MemorySink {
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl MediaSink for MemorySink {
    fn track_sid(&self) -> &str {
        &self.track_sid
    }

    fn autoplay(&self) -> bool {
        self.autoplay
    }

    fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    fn plays_inline(&self) -> bool {
        self.plays_inline
    }

    fn set_plays_inline(&mut self, inline: bool) {
        self.plays_inline = inline;
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}
