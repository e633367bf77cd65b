//! Call session
//!
//! [`CallSession`] is the single controller behind the call widget. It owns
//! the RTC connection for the current attempt, drives the handshake, reacts
//! to remote lifecycle events and tells the [`StatusPresenter`] what
//! happened.
//!
//! # Attempt lifecycle
//!
//! ```text
//! Idle ─start()─► AwaitingLibrary ─► Connecting ─► Connected ─end()/remote─► Ended
//!                       │                │
//!                       └──── error ─────┴──► Failed(kind)
//! ```
//!
//! `start()` is accepted from `Idle`, `Ended` and `Failed`; anywhere else it
//! is ignored. `end()` during the handshake records a cancellation that the
//! running `start()` honors at its next step boundary. A cancellation that
//! arrives while the RTC library is still awaited takes effect at once.
//!
//! # Locking
//!
//! Session state sits behind one short-held mutex that is never held across
//! an await. The start guard and the first state write happen under the
//! same lock. Every state change is presented under that lock too, so the
//! surface never shows a stale attempt.
//!
//! Disconnecting an old connection may still be in flight when the next
//! attempt starts. The new attempt waits for it before building its own
//! connection.

use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{Credential, HttpSessionBackend, SessionBackend};
use crate::config::WidgetConfig;
use crate::error::{WidgetError, WidgetResult};
use crate::events::{EventEmitter, EventStream, SessionEvent};
use crate::presenter::{StatusPresenter, WidgetSurface};
use crate::readiness::LibraryDetector;
use crate::rtc::{LibraryNamespace, RtcConnection, RtcEvent, SubscriptionId, TrackKind};

mod identifiers;
mod state;

#[cfg(test)]
mod tests;

pub use identifiers::AttemptIdentity;
pub use state::CallState;

/// Identifier of one user-initiated call attempt
pub type AttemptId = Uuid;

/// Result of [`CallSession::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The attempt reached `Connected`
    Connected(AttemptId),
    /// An attempt is already running or connected; nothing was done
    Ignored,
    /// `end()` or a remote disconnect cancelled the handshake; the session is `Ended`
    Cancelled,
}

/// Result of [`CallSession::end`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// The connected call was torn down
    Ended,
    /// The handshake is still running and will stop at its next step
    CancelRequested,
    /// No call to end
    Ignored,
}

/// Read-only view of the current attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptInfo {
    pub id: AttemptId,
    pub room: String,
    pub participant: String,
    /// Room name confirmed by the backend, once the credential arrived
    pub room_name: Option<String>,
}

/// Resources owned by one attempt
struct Attempt {
    id: AttemptId,
    identity: AttemptIdentity,
    credential: Option<Credential>,
    connection: Option<Arc<dyn RtcConnection>>,
    subscription: Option<SubscriptionId>,
    pump: Option<JoinHandle<()>>,
    cancel_requested: bool,
    cancel: Arc<Notify>,
}

impl Attempt {
    fn new(id: AttemptId, identity: AttemptIdentity) -> Self {
        Self {
            id,
            identity,
            credential: None,
            connection: None,
            subscription: None,
            pump: None,
            cancel_requested: false,
            cancel: Arc::new(Notify::new()),
        }
    }

    fn request_cancel(&mut self) {
        self.cancel_requested = true;
        self.cancel.notify_one();
    }

    fn info(&self) -> AttemptInfo {
        AttemptInfo {
            id: self.id,
            room: self.identity.room.clone(),
            participant: self.identity.participant.clone(),
            room_name: self.credential.as_ref().map(|c| c.room_name.clone()),
        }
    }
}

#[derive(Default)]
struct SessionSlot {
    state: CallState,
    attempt: Option<Attempt>,
}

impl SessionSlot {
    fn attempt_mut(&mut self, id: AttemptId) -> Option<&mut Attempt> {
        self.attempt.as_mut().filter(|a| a.id == id)
    }
}

/// How an attempt reached `Ended`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndCause {
    /// `end()` on a connected call
    User,
    /// The connection reported it was gone
    Remote,
    /// The handshake was cancelled before it completed
    Cancelled,
}

impl EndCause {
    fn disconnects(&self) -> bool {
        !matches!(self, Self::Remote)
    }
}

/// How far the handshake got
enum Handshake {
    Established,
    Cancelled,
}

/// Keeps the in-flight teardown count raised until dropped
struct TeardownGuard(Arc<watch::Sender<usize>>);

impl TeardownGuard {
    fn begin(count: &Arc<watch::Sender<usize>>) -> Self {
        count.send_modify(|n| *n += 1);
        Self(count.clone())
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct SessionInner {
    config: WidgetConfig,
    detector: LibraryDetector,
    backend: Arc<dyn SessionBackend>,
    presenter: StatusPresenter,
    events: EventEmitter,
    slot: Mutex<SessionSlot>,
    teardowns: Arc<watch::Sender<usize>>,
}

/// Handle to the call session; clones share the same session
#[derive(Clone)]
pub struct CallSession {
    inner: Arc<SessionInner>,
}

impl CallSession {
    /// Create a session talking to the HTTP backend at `config.backend_url`
    pub fn new(
        config: WidgetConfig,
        namespace: Arc<dyn LibraryNamespace>,
        surface: Arc<dyn WidgetSurface>,
    ) -> WidgetResult<Self> {
        let backend = Arc::new(HttpSessionBackend::from_config(&config)?);
        Self::with_backend(config, namespace, backend, surface)
    }

    /// Create a session with a custom backend
    pub fn with_backend(
        config: WidgetConfig,
        namespace: Arc<dyn LibraryNamespace>,
        backend: Arc<dyn SessionBackend>,
        surface: Arc<dyn WidgetSurface>,
    ) -> WidgetResult<Self> {
        config.validate()?;

        let detector = LibraryDetector::new(namespace, &config.readiness);
        let presenter = StatusPresenter::new(surface, config.agent.brand_name.clone());

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                detector,
                backend,
                presenter,
                events: EventEmitter::default(),
                slot: Mutex::new(SessionSlot::default()),
                teardowns: Arc::new(watch::channel(0).0),
            }),
        })
    }

    pub fn state(&self) -> CallState {
        self.inner.slot.lock().state.clone()
    }

    pub fn current_attempt(&self) -> Option<AttemptInfo> {
        self.inner.slot.lock().attempt.as_ref().map(Attempt::info)
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.inner.config
    }

    pub fn presenter(&self) -> &StatusPresenter {
        &self.inner.presenter
    }

    pub fn detector(&self) -> &LibraryDetector {
        &self.inner.detector
    }

    /// Subscribe to session events
    pub fn events(&self) -> EventStream {
        self.inner.events.subscribe()
    }

    /// Begin a call attempt
    ///
    /// Returns once the attempt is connected, cancelled, or failed. A fatal
    /// handshake error leaves the session in `Failed` and is returned as is.
    pub async fn start(&self) -> WidgetResult<StartOutcome> {
        let (id, identity, cancel) = {
            let mut slot = self.inner.slot.lock();
            if !slot.state.accepts_start() {
                debug!("start() ignored while {}", slot.state);
                return Ok(StartOutcome::Ignored);
            }

            let id = Uuid::new_v4();
            let identity = AttemptIdentity::generate(&self.inner.config.identity);
            let attempt = Attempt::new(id, identity.clone());
            let cancel = attempt.cancel.clone();
            slot.attempt = Some(attempt);
            self.inner.transition(&mut slot, id, CallState::AwaitingLibrary);
            self.inner.presenter.call_starting();
            (id, identity, cancel)
        };

        info!(
            "Starting call attempt {} (room {}, participant {})",
            id, identity.room, identity.participant
        );

        match self.inner.handshake(id, &identity, &cancel).await {
            Ok(Handshake::Established) => {
                if self.inner.complete_connection(id) {
                    Ok(StartOutcome::Connected(id))
                } else {
                    self.inner.end_attempt(id, EndCause::Cancelled).await;
                    Ok(StartOutcome::Cancelled)
                }
            }
            Ok(Handshake::Cancelled) => {
                self.inner.end_attempt(id, EndCause::Cancelled).await;
                Ok(StartOutcome::Cancelled)
            }
            Err(e) => {
                self.inner.fail_attempt(id, &e).await;
                Err(e)
            }
        }
    }

    /// End the current call, or cancel the running handshake
    pub async fn end(&self) -> EndOutcome {
        let connected = {
            let mut guard = self.inner.slot.lock();
            let slot = &mut *guard;
            match slot.state {
                CallState::Connected => slot.attempt.as_ref().map(|a| a.id),
                CallState::AwaitingLibrary | CallState::Connecting => {
                    if let Some(attempt) = slot.attempt.as_mut() {
                        info!("Cancellation requested for attempt {}", attempt.id);
                        attempt.request_cancel();
                    }
                    return EndOutcome::CancelRequested;
                }
                _ => None,
            }
        };

        match connected {
            Some(id) if self.inner.end_attempt(id, EndCause::User).await => EndOutcome::Ended,
            _ => {
                debug!("end() ignored, no connected call");
                EndOutcome::Ignored
            }
        }
    }
}

impl SessionInner {
    /// Record a state change and broadcast it; the caller holds the lock
    fn transition(&self, slot: &mut SessionSlot, attempt: AttemptId, next: CallState) {
        debug_assert!(
            slot.state.can_advance_to(&next),
            "illegal transition {} -> {}",
            slot.state,
            next
        );

        let previous = std::mem::replace(&mut slot.state, next.clone());
        info!("Call attempt {}: {} -> {}", attempt, previous, next);
        self.events.emit(SessionEvent::StateChanged {
            attempt,
            previous,
            new: next,
        });
    }

    fn cancel_requested(&self, id: AttemptId) -> bool {
        let mut slot = self.slot.lock();
        slot.attempt_mut(id).is_none_or(|a| a.cancel_requested)
    }

    /// Move to `next` unless the attempt was cancelled in the meantime
    fn advance(&self, id: AttemptId, next: CallState) -> bool {
        let mut slot = self.slot.lock();
        let proceed = slot.attempt_mut(id).is_some_and(|a| !a.cancel_requested);
        if proceed {
            self.transition(&mut slot, id, next);
        }
        proceed
    }

    fn complete_connection(&self, id: AttemptId) -> bool {
        let mut slot = self.slot.lock();
        let proceed = slot.attempt_mut(id).is_some_and(|a| !a.cancel_requested);
        if proceed {
            self.transition(&mut slot, id, CallState::Connected);
            self.presenter.call_connected();
        }
        proceed
    }

    /// Run `present` only while `id` is still the current attempt
    fn present_if_current(&self, id: AttemptId, present: impl FnOnce(&StatusPresenter)) -> bool {
        let slot = self.slot.lock();
        let current = slot.attempt.as_ref().is_some_and(|a| a.id == id);
        if current {
            present(&self.presenter);
        }
        current
    }

    /// Wait until no earlier connection is still disconnecting
    async fn teardowns_settled(&self) {
        let mut pending = self.teardowns.subscribe();
        if *pending.borrow() > 0 {
            debug!("Waiting for the previous connection to disconnect");
        }
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    async fn handshake(
        self: &Arc<Self>,
        id: AttemptId,
        identity: &AttemptIdentity,
        cancel: &Notify,
    ) -> WidgetResult<Handshake> {
        let library = tokio::select! {
            ready = self.detector.await_ready() => ready?,
            _ = cancel.notified() => {
                debug!("Attempt {} cancelled while waiting for the RTC library", id);
                return Ok(Handshake::Cancelled);
            }
        };

        if !self.advance(id, CallState::Connecting) {
            return Ok(Handshake::Cancelled);
        }

        let credential = self
            .backend
            .request_credential(&identity.room, &identity.participant)
            .await?;
        if let Some(attempt) = self.slot.lock().attempt_mut(id) {
            attempt.credential = Some(credential.clone());
        }

        if let Err(e) = self.backend.activate_agent(&credential.room_name).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("Agent activation for room {} failed, continuing: {}", credential.room_name, e);
            self.events.emit(SessionEvent::AgentActivationFailed {
                attempt: id,
                message: e.to_string(),
            });
        }

        self.teardowns_settled().await;
        if self.cancel_requested(id) {
            return Ok(Handshake::Cancelled);
        }

        let connection = library
            .create_connection(self.config.connection)
            .map_err(|e| WidgetError::connect(e.message()))?;

        // Handlers go in before connect so no early event is missed
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = connection.subscribe(tx);
        let pump = tokio::spawn(pump_events(Arc::downgrade(self), id, rx));
        {
            let mut slot = self.slot.lock();
            match slot.attempt_mut(id) {
                Some(attempt) => {
                    attempt.connection = Some(connection.clone());
                    attempt.subscription = Some(subscription);
                    attempt.pump = Some(pump);
                }
                None => {
                    connection.unsubscribe(subscription);
                    pump.abort();
                    return Ok(Handshake::Cancelled);
                }
            }
        }

        connection
            .connect(&credential.url, &credential.token)
            .await
            .map_err(|e| WidgetError::connect(e.message()))?;

        if self.cancel_requested(id) {
            return Ok(Handshake::Cancelled);
        }

        connection
            .set_microphone_enabled(true)
            .await
            .map_err(|e| WidgetError::microphone(e.message()))?;

        Ok(Handshake::Established)
    }

    /// Abort the attempt with a fatal error
    async fn fail_attempt(&self, id: AttemptId, err: &WidgetError) {
        let (attempt, _teardown) = {
            let mut slot = self.slot.lock();
            if slot.attempt_mut(id).is_none() {
                return;
            }
            let attempt = slot.attempt.take();
            self.transition(
                &mut slot,
                id,
                CallState::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                },
            );
            self.presenter.call_failed(err);
            (attempt, TeardownGuard::begin(&self.teardowns))
        };

        error!("Call attempt {} failed: {}", id, err);
        if let Some(attempt) = attempt {
            self.release(attempt, true, true).await;
        }
    }

    /// Shared teardown for user end, remote disconnect and cancellation
    ///
    /// Returns false when the attempt was already gone.
    async fn end_attempt(&self, id: AttemptId, cause: EndCause) -> bool {
        let (attempt, _teardown) = {
            let mut slot = self.slot.lock();
            if slot.attempt_mut(id).is_none() || !slot.state.can_advance_to(&CallState::Ended) {
                return false;
            }
            let attempt = slot.attempt.take();
            self.transition(&mut slot, id, CallState::Ended);
            self.presenter.call_ended();
            (attempt, TeardownGuard::begin(&self.teardowns))
        };

        info!("Call attempt {} ended ({:?})", id, cause);
        if let Some(attempt) = attempt {
            // The pump itself runs remote teardown, so it must not be aborted from here
            let abort_pump = cause != EndCause::Remote;
            self.release(attempt, abort_pump, cause.disconnects()).await;
        }
        true
    }

    /// Drop every resource an attempt holds
    async fn release(&self, mut attempt: Attempt, abort_pump: bool, disconnect: bool) {
        let connection = attempt.connection.take();

        if let (Some(connection), Some(subscription)) = (&connection, attempt.subscription.take()) {
            connection.unsubscribe(subscription);
        }

        if let Some(pump) = attempt.pump.take() {
            if abort_pump {
                pump.abort();
            }
        }

        if let Some(connection) = connection {
            if disconnect {
                if let Err(e) = connection.disconnect().await {
                    warn!("Disconnect for attempt {} failed: {}", attempt.id, e);
                }
            }
        }
    }

    async fn handle_rtc_event(&self, id: AttemptId, event: RtcEvent) -> ControlFlow<()> {
        let state = {
            let slot = self.slot.lock();
            if slot.attempt.as_ref().map(|a| a.id) != Some(id) {
                debug!("Dropping {:?} for stale attempt {}", event, id);
                return ControlFlow::Break(());
            }
            slot.state.clone()
        };

        match event {
            RtcEvent::Connected => debug!("Room connected for attempt {}", id),
            RtcEvent::StateChanged(room_state) => debug!("Room state changed: {}", room_state),
            RtcEvent::ParticipantConnected(participant) => {
                if self.config.agent.is_agent(&participant) {
                    info!("Agent {} joined attempt {}", participant.identity, id);
                    if !self.present_if_current(id, StatusPresenter::agent_ready) {
                        return ControlFlow::Break(());
                    }
                    self.events.emit(SessionEvent::AgentJoined {
                        attempt: id,
                        identity: participant.identity,
                    });
                } else {
                    debug!("Participant connected: {:?}", participant);
                }
            }
            RtcEvent::TrackSubscribed { track, participant } => {
                if track.kind() == TrackKind::Audio {
                    let mut sink = track.attach();
                    sink.set_autoplay(true);
                    sink.set_plays_inline(true);
                    if !self.present_if_current(id, |presenter| presenter.attach_audio(sink)) {
                        return ControlFlow::Break(());
                    }
                    debug!("Attached audio track {} from {}", track.sid(), participant.identity);
                    self.events.emit(SessionEvent::AudioAttached {
                        attempt: id,
                        track_sid: track.sid().to_string(),
                    });
                } else {
                    debug!("Ignoring {:?} track {}", track.kind(), track.sid());
                }
            }
            RtcEvent::Disconnected { reason } => {
                info!(
                    "Room disconnected for attempt {}: {}",
                    id,
                    reason.as_deref().unwrap_or("no reason given")
                );
                if state.is_connected() {
                    self.end_attempt(id, EndCause::Remote).await;
                } else if state.is_in_flight() {
                    if let Some(attempt) = self.slot.lock().attempt_mut(id) {
                        attempt.request_cancel();
                    }
                }
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }
}

/// Deliver RTC events for one attempt to the session until it goes away
async fn pump_events(session: Weak<SessionInner>, id: AttemptId, mut events: mpsc::UnboundedReceiver<RtcEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        if inner.handle_rtc_event(id, event).await.is_break() {
            break;
        }
    }
    debug!("Event pump for attempt {} stopped", id);
}
