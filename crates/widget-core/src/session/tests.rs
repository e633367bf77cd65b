//! Call session state machine tests
//!
//! Run against the in-memory RTC library and a scripted backend on a paused
//! clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_stream::StreamExt;

use super::*;
use crate::error::FailureKind;
use crate::presenter::{ControlLayout, HeadlessSurface, StatusKind};
use crate::rtc::{
    ConnectionOptions, GlobalNamespace, MemoryBehavior, MemoryRtcLibrary, MemoryTrack, ParticipantInfo, RtcCall,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum BackendCall {
    Credential { room: String, participant: String },
    Agent { room_name: String },
}

#[derive(Default)]
struct ScriptedBackend {
    credential_error: Option<String>,
    agent_error: Option<String>,
    agent_credential_error: Option<String>,
    empty_url: bool,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn request_credential(&self, room: &str, participant: &str) -> WidgetResult<Credential> {
        self.calls.lock().push(BackendCall::Credential {
            room: room.to_string(),
            participant: participant.to_string(),
        });
        if let Some(message) = &self.credential_error {
            return Err(WidgetError::credential(message.clone()));
        }
        if self.empty_url {
            return Err(WidgetError::credential("connection URL not configured"));
        }
        Ok(Credential {
            token: format!("token-for-{participant}"),
            url: "wss://rtc.test".to_string(),
            room_name: format!("{room}-confirmed"),
        })
    }

    async fn activate_agent(&self, room_name: &str) -> WidgetResult<()> {
        self.calls.lock().push(BackendCall::Agent {
            room_name: room_name.to_string(),
        });
        if let Some(message) = &self.agent_credential_error {
            return Err(WidgetError::credential(message.clone()));
        }
        match &self.agent_error {
            Some(message) => Err(WidgetError::agent_activation(message.clone())),
            None => Ok(()),
        }
    }
}

struct Fixture {
    session: CallSession,
    library: Arc<MemoryRtcLibrary>,
    backend: Arc<ScriptedBackend>,
    surface: Arc<HeadlessSurface>,
}

fn fixture_with(behavior: MemoryBehavior, backend: ScriptedBackend) -> Fixture {
    let namespace = Arc::new(GlobalNamespace::new());
    let library = Arc::new(MemoryRtcLibrary::with_behavior(behavior));
    namespace.install("LivekitClient", library.clone());
    build(namespace, library, backend)
}

fn fixture() -> Fixture {
    fixture_with(MemoryBehavior::default(), ScriptedBackend::default())
}

fn build(namespace: Arc<GlobalNamespace>, library: Arc<MemoryRtcLibrary>, backend: ScriptedBackend) -> Fixture {
    let backend = Arc::new(backend);
    let surface = Arc::new(HeadlessSurface::new());
    let session =
        CallSession::with_backend(WidgetConfig::default(), namespace, backend.clone(), surface.clone()).unwrap();
    session.presenter().reset();
    Fixture {
        session,
        library,
        backend,
        surface,
    }
}

/// Let spawned tasks run until `done` holds
async fn wait_until(done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn happy_path_reaches_connected() {
    let f = fixture();

    let outcome = f.session.start().await.unwrap();
    let StartOutcome::Connected(id) = outcome else {
        panic!("expected Connected, got {outcome:?}");
    };

    assert_eq!(f.session.state(), CallState::Connected);
    let attempt = f.session.current_attempt().unwrap();
    assert_eq!(attempt.id, id);
    assert!(attempt.room.starts_with("shop-"));
    assert!(attempt.participant.starts_with("Customer-"));
    assert_eq!(attempt.room_name, Some(format!("{}-confirmed", attempt.room)));

    let snapshot = f.surface.snapshot();
    assert_eq!(snapshot.layout, ControlLayout::InCall);
    assert_eq!(snapshot.status_kind, StatusKind::Connected);
    assert_eq!(snapshot.status_text, "Connected! Shop Whisper is ready to help you.");

    let connection = f.library.last_connection().unwrap();
    assert!(connection.is_connected());
    assert!(connection.microphone_enabled());
    assert_eq!(connection.options(), ConnectionOptions::default());
}

#[tokio::test(start_paused = true)]
async fn backend_calls_run_credential_first_with_confirmed_room() {
    let f = fixture();
    f.session.start().await.unwrap();

    let attempt = f.session.current_attempt().unwrap();
    assert_eq!(
        f.backend.calls(),
        vec![
            BackendCall::Credential {
                room: attempt.room.clone(),
                participant: attempt.participant.clone(),
            },
            BackendCall::Agent {
                room_name: format!("{}-confirmed", attempt.room),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn handlers_are_registered_before_connect() {
    let f = fixture();
    f.session.start().await.unwrap();

    let journal = f.library.journal();
    let subscribe = journal.position(|c| matches!(c, RtcCall::Subscribe(_))).unwrap();
    let connect = journal.position(|c| matches!(c, RtcCall::Connect { .. })).unwrap();
    let microphone = journal.position(|c| *c == RtcCall::SetMicrophone(true)).unwrap();
    assert!(subscribe < connect);
    assert!(connect < microphone);
    assert_eq!(
        journal.calls()[2],
        RtcCall::Connect {
            url: "wss://rtc.test".to_string(),
            token: format!("token-for-{}", f.session.current_attempt().unwrap().participant),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn start_is_ignored_while_connected() {
    let f = fixture();
    f.session.start().await.unwrap();
    let before = f.backend.calls().len();

    assert_eq!(f.session.start().await.unwrap(), StartOutcome::Ignored);
    assert_eq!(f.backend.calls().len(), before);
    assert_eq!(f.library.connections().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_starts_run_one_attempt() {
    let f = fixture_with(
        MemoryBehavior {
            connect_delay: Some(Duration::from_millis(500)),
            ..Default::default()
        },
        ScriptedBackend::default(),
    );

    let first = f.session.clone();
    let second = f.session.clone();
    let (a, b) = tokio::join!(first.start(), second.start());
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| **o == StartOutcome::Ignored).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| matches!(o, StartOutcome::Connected(_))).count(), 1);
    assert_eq!(f.library.connections().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_library_fails_after_deadline() {
    let namespace = Arc::new(GlobalNamespace::new());
    let f = build(namespace, Arc::new(MemoryRtcLibrary::new()), ScriptedBackend::default());

    let started = Instant::now();
    let err = f.session.start().await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(10_000));

    assert!(matches!(err, WidgetError::LibraryUnavailable { .. }));
    assert!(matches!(
        f.session.state(),
        CallState::Failed {
            kind: FailureKind::LibraryUnavailable,
            ..
        }
    ));
    assert!(f.backend.calls().is_empty());

    let snapshot = f.surface.snapshot();
    assert_eq!(snapshot.status_kind, StatusKind::Warning);
    assert!(snapshot.start_enabled);
}

#[tokio::test(start_paused = true)]
async fn credential_failure_constructs_no_connection() {
    let f = fixture_with(
        MemoryBehavior::default(),
        ScriptedBackend {
            credential_error: Some("db down".to_string()),
            ..Default::default()
        },
    );

    let err = f.session.start().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Credential);
    assert!(f.library.journal().calls().is_empty());

    let snapshot = f.surface.snapshot();
    assert!(snapshot.status_text.contains("db down"));
    assert_eq!(snapshot.status_kind, StatusKind::Error);
    assert!(snapshot.start_enabled);
    assert_eq!(snapshot.layout, ControlLayout::PreCall);
}

#[tokio::test(start_paused = true)]
async fn microphone_failure_tears_down_the_connection() {
    let f = fixture_with(
        MemoryBehavior {
            microphone_error: Some("Permission denied".to_string()),
            ..Default::default()
        },
        ScriptedBackend::default(),
    );

    let err = f.session.start().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to enable microphone: Permission denied");
    assert_eq!(
        f.session.state(),
        CallState::Failed {
            kind: FailureKind::Microphone,
            message: "Failed to enable microphone: Permission denied".to_string(),
        }
    );

    let connection = f.library.last_connection().unwrap();
    assert_eq!(connection.subscriber_count(), 0);
    assert!(!connection.is_connected());
    assert_eq!(f.library.journal().count(|c| *c == RtcCall::Disconnect), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_is_reported_and_retry_is_allowed() {
    let f = fixture_with(
        MemoryBehavior {
            connect_error: Some("signal timeout".to_string()),
            ..Default::default()
        },
        ScriptedBackend::default(),
    );

    let err = f.session.start().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Connect);
    assert!(f.session.current_attempt().is_none());

    f.library.update_behavior(|b| b.connect_error = None);
    assert!(matches!(f.session.start().await.unwrap(), StartOutcome::Connected(_)));
    assert_eq!(f.library.connections().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn agent_activation_failure_is_not_fatal() {
    let f = fixture_with(
        MemoryBehavior::default(),
        ScriptedBackend {
            agent_error: Some("Service Unavailable".to_string()),
            ..Default::default()
        },
    );
    let mut events = f.session.events();

    assert!(matches!(f.session.start().await.unwrap(), StartOutcome::Connected(_)));

    let mut saw_activation_failure = false;
    while let Ok(Some(Ok(event))) = tokio::time::timeout(Duration::from_millis(10), events.next()).await {
        if let SessionEvent::AgentActivationFailed { message, .. } = event {
            assert!(message.contains("Service Unavailable"));
            saw_activation_failure = true;
        }
    }
    assert!(saw_activation_failure);
}

#[tokio::test(start_paused = true)]
async fn fatal_errors_from_agent_activation_abort_the_attempt() {
    let f = fixture_with(
        MemoryBehavior::default(),
        ScriptedBackend {
            agent_credential_error: Some("token revoked".to_string()),
            ..Default::default()
        },
    );

    let err = f.session.start().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Credential);
    assert!(f.session.state().is_terminal());
    assert!(f.library.connections().is_empty());
}

#[tokio::test(start_paused = true)]
async fn end_tears_down_a_connected_call() {
    let f = fixture();
    f.session.start().await.unwrap();
    let connection = f.library.last_connection().unwrap();

    assert_eq!(f.session.end().await, EndOutcome::Ended);
    assert_eq!(f.session.state(), CallState::Ended);
    assert!(!connection.is_connected());
    assert_eq!(connection.subscriber_count(), 0);

    let snapshot = f.surface.snapshot();
    assert_eq!(snapshot.status_text, "Call ended");
    assert_eq!(snapshot.status_class(), "call-status ");
    assert_eq!(snapshot.layout, ControlLayout::PreCall);
    assert!(snapshot.start_enabled);

    assert_eq!(f.session.end().await, EndOutcome::Ignored);
}

#[tokio::test(start_paused = true)]
async fn end_during_handshake_cancels_the_attempt() {
    let f = fixture_with(
        MemoryBehavior {
            connect_delay: Some(Duration::from_secs(2)),
            ..Default::default()
        },
        ScriptedBackend::default(),
    );

    let session = f.session.clone();
    let start = tokio::spawn(async move { session.start().await });

    let library = f.library.clone();
    wait_until(|| library.last_connection().is_some()).await;
    assert_eq!(f.session.state(), CallState::Connecting);
    assert_eq!(f.session.end().await, EndOutcome::CancelRequested);

    assert_eq!(start.await.unwrap().unwrap(), StartOutcome::Cancelled);
    assert_eq!(f.session.state(), CallState::Ended);

    let connection = f.library.last_connection().unwrap();
    assert!(!connection.is_connected());
    assert_eq!(connection.subscriber_count(), 0);
    assert_eq!(f.surface.snapshot().status_text, "Call ended");
    assert_eq!(f.library.journal().count(|c| *c == RtcCall::SetMicrophone(true)), 0);
}

#[tokio::test(start_paused = true)]
async fn end_before_library_arrives_skips_the_backend() {
    let namespace = Arc::new(GlobalNamespace::new());
    let library = Arc::new(MemoryRtcLibrary::new());
    let f = build(namespace.clone(), library.clone(), ScriptedBackend::default());

    let session = f.session.clone();
    let start = tokio::spawn(async move { session.start().await });
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(f.session.state(), CallState::AwaitingLibrary);
    assert_eq!(f.session.end().await, EndOutcome::CancelRequested);

    namespace.install("livekit", library);
    assert_eq!(start.await.unwrap().unwrap(), StartOutcome::Cancelled);
    assert!(f.backend.calls().is_empty());
    assert_eq!(f.session.state(), CallState::Ended);
}

#[tokio::test(start_paused = true)]
async fn end_while_waiting_for_library_cancels_at_once() {
    let namespace = Arc::new(GlobalNamespace::new());
    let f = build(namespace, Arc::new(MemoryRtcLibrary::new()), ScriptedBackend::default());

    let session = f.session.clone();
    let started = Instant::now();
    let start = tokio::spawn(async move { session.start().await });
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(f.session.end().await, EndOutcome::CancelRequested);

    assert_eq!(start.await.unwrap().unwrap(), StartOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(f.session.state(), CallState::Ended);

    let snapshot = f.surface.snapshot();
    assert_eq!(snapshot.status_kind, StatusKind::Neutral);
    assert_eq!(snapshot.status_text, "Call ended");
    assert!(snapshot.start_enabled);
}

#[tokio::test(start_paused = true)]
async fn restart_during_slow_disconnect_keeps_the_new_attempt_on_screen() {
    let f = fixture_with(
        MemoryBehavior {
            disconnect_delay: Some(Duration::from_secs(1)),
            ..Default::default()
        },
        ScriptedBackend::default(),
    );
    f.session.start().await.unwrap();

    let session = f.session.clone();
    let end = tokio::spawn(async move { session.end().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(f.session.state(), CallState::Ended);
    assert_eq!(f.surface.snapshot().status_text, "Call ended");

    let session = f.session.clone();
    let restart = tokio::spawn(async move { session.start().await });
    let current = f.session.clone();
    wait_until(|| current.state() == CallState::Connecting).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(f.library.connections().len(), 1);

    assert_eq!(end.await.unwrap(), EndOutcome::Ended);
    assert!(matches!(restart.await.unwrap().unwrap(), StartOutcome::Connected(_)));
    assert_eq!(f.library.connections().len(), 2);

    let snapshot = f.surface.snapshot();
    assert_eq!(f.session.state(), CallState::Connected);
    assert_eq!(snapshot.status_kind, StatusKind::Connected);
    assert_eq!(snapshot.layout, ControlLayout::InCall);
    assert!(!snapshot.start_enabled);
}

#[tokio::test(start_paused = true)]
async fn remote_disconnect_ends_the_call() {
    let f = fixture();
    f.session.start().await.unwrap();
    let connection = f.library.last_connection().unwrap();

    assert_eq!(connection.drop_remote("server shutdown"), 1);
    let session = f.session.clone();
    wait_until(|| session.state() == CallState::Ended).await;

    assert_eq!(connection.subscriber_count(), 0);
    assert_eq!(f.library.journal().count(|c| *c == RtcCall::Disconnect), 0);
    assert_eq!(f.surface.snapshot().status_text, "Call ended");

    assert!(matches!(f.session.start().await.unwrap(), StartOutcome::Connected(_)));
}

#[tokio::test(start_paused = true)]
async fn user_end_and_remote_disconnect_leave_the_same_ui() {
    let by_user = fixture();
    by_user.session.start().await.unwrap();
    by_user.session.end().await;

    let by_remote = fixture();
    by_remote.session.start().await.unwrap();
    by_remote.library.last_connection().unwrap().drop_remote("kicked");
    let session = by_remote.session.clone();
    wait_until(|| session.state() == CallState::Ended).await;

    assert_eq!(by_user.surface.snapshot(), by_remote.surface.snapshot());
}

#[tokio::test(start_paused = true)]
async fn remote_events_drive_status_and_audio() {
    let agent = ParticipantInfo::new("shop-whisper-1a2b").with_name("shop-whisper-agent");
    let f = fixture_with(
        MemoryBehavior {
            events_on_connect: vec![
                RtcEvent::ParticipantConnected(ParticipantInfo::new("Customer-other")),
                RtcEvent::ParticipantConnected(agent.clone()),
                RtcEvent::TrackSubscribed {
                    track: MemoryTrack::audio("TR_audio_1"),
                    participant: agent.clone(),
                },
                RtcEvent::TrackSubscribed {
                    track: MemoryTrack::video("TR_video_1"),
                    participant: agent.clone(),
                },
            ],
            ..Default::default()
        },
        ScriptedBackend::default(),
    );
    let mut events = f.session.events();

    f.session.start().await.unwrap();
    let surface = f.surface.clone();
    wait_until(|| surface.snapshot().audio_track.is_some()).await;

    assert_eq!(f.surface.snapshot().audio_track.as_deref(), Some("TR_audio_1"));
    assert_eq!(f.surface.audio_flags(), Some((true, true)));

    f.library
        .last_connection()
        .unwrap()
        .emit(RtcEvent::TrackSubscribed {
            track: MemoryTrack::audio("TR_audio_2"),
            participant: agent,
        });
    wait_until(|| surface.snapshot().audio_track.as_deref() == Some("TR_audio_2")).await;

    let mut joined = Vec::new();
    while let Ok(Some(Ok(event))) = tokio::time::timeout(Duration::from_millis(10), events.next()).await {
        if let SessionEvent::AgentJoined { identity, .. } = event {
            joined.push(identity);
        }
    }
    assert_eq!(joined, vec!["shop-whisper-1a2b".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn events_for_an_ended_attempt_are_dropped() {
    let f = fixture();
    f.session.start().await.unwrap();
    let old = f.library.last_connection().unwrap();
    f.session.end().await;

    assert_eq!(
        old.emit(RtcEvent::TrackSubscribed {
            track: MemoryTrack::audio("TR_late"),
            participant: ParticipantInfo::new("shop-whisper"),
        }),
        0
    );
    assert_eq!(f.surface.snapshot().audio_track, None);
}

#[tokio::test(start_paused = true)]
async fn state_changes_are_broadcast_in_order() {
    let f = fixture();
    let mut events = f.session.events();
    f.session.start().await.unwrap();
    f.session.end().await;

    let mut states = Vec::new();
    while let Ok(Some(Ok(event))) = tokio::time::timeout(Duration::from_millis(10), events.next()).await {
        if let SessionEvent::StateChanged { new, .. } = event {
            states.push(new);
        }
    }
    assert_eq!(
        states,
        vec![
            CallState::AwaitingLibrary,
            CallState::Connecting,
            CallState::Connected,
            CallState::Ended,
        ]
    );
}

#[test]
fn invalid_config_is_rejected() {
    let surface = Arc::new(HeadlessSurface::new());
    let result = CallSession::with_backend(
        WidgetConfig::new(""),
        Arc::new(GlobalNamespace::new()),
        Arc::new(ScriptedBackend::default()),
        surface,
    );
    assert!(matches!(result, Err(WidgetError::Configuration { .. })));
}
