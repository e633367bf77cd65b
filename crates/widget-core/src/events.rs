//! Event system for the call session
//!
//! The session broadcasts what it does so page glue, analytics and tests can
//! follow along without reaching into session state.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::session::{AttemptId, CallState};

/// Events emitted by the call session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session state changed
    StateChanged {
        /// Attempt the transition belongs to
        attempt: AttemptId,
        /// Previous state
        previous: CallState,
        /// New state
        new: CallState,
    },

    /// The remote agent joined the room
    AgentJoined {
        attempt: AttemptId,
        identity: String,
    },

    /// A remote audio track was attached to the output sink
    AudioAttached {
        attempt: AttemptId,
        track_sid: String,
    },

    /// Agent activation failed; the attempt carried on
    AgentActivationFailed {
        attempt: AttemptId,
        message: String,
    },
}

/// Event stream type
pub type EventStream = BroadcastStream<SessionEvent>;

/// Event emitter for the call session
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
