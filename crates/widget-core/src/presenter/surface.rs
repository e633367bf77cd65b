//! UI surface contract and a headless implementation

use parking_lot::Mutex;

use super::{ControlLayout, StatusKind};
use crate::catalog::CatalogView;
use crate::rtc::MediaSink;

/// The page elements the widget writes to
///
/// Implementations apply each call immediately; none of them can fail.
pub trait WidgetSurface: Send + Sync {
    /// Replace the status line text and styling
    fn show_status(&self, kind: StatusKind, message: &str);

    fn set_start_enabled(&self, enabled: bool);

    /// Show the start or end control
    fn set_layout(&self, layout: ControlLayout);

    /// Empty the audio container and put `sink` in it
    fn replace_audio_output(&self, sink: Box<dyn MediaSink>);

    fn clear_audio_output(&self);

    fn render_catalog(&self, view: &CatalogView);
}

/// What a [`HeadlessSurface`] currently shows
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSnapshot {
    pub status_kind: StatusKind,
    pub status_text: String,
    pub start_enabled: bool,
    pub layout: ControlLayout,
    /// Track bound to the audio output, if any
    pub audio_track: Option<String>,
    pub catalog: Option<CatalogView>,
}

impl SurfaceSnapshot {
    /// CSS class list of the status element
    pub fn status_class(&self) -> String {
        self.status_kind.css_class()
    }
}

impl Default for SurfaceSnapshot {
    fn default() -> Self {
        Self {
            status_kind: StatusKind::Neutral,
            status_text: String::new(),
            start_enabled: true,
            layout: ControlLayout::PreCall,
            audio_track: None,
            catalog: None,
        }
    }
}

#[derive(Default)]
struct HeadlessState {
    snapshot: SurfaceSnapshot,
    audio: Option<Box<dyn MediaSink>>,
    status_history: Vec<(StatusKind, String)>,
}

/// In-memory surface for headless use and tests
#[derive(Default)]
pub struct HeadlessSurface {
    state: Mutex<HeadlessState>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Every status shown so far, oldest first
    pub fn status_history(&self) -> Vec<(StatusKind, String)> {
        self.state.lock().status_history.clone()
    }

    /// `(autoplay, plays_inline)` of the current audio sink
    pub fn audio_flags(&self) -> Option<(bool, bool)> {
        self.state
            .lock()
            .audio
            .as_ref()
            .map(|sink| (sink.autoplay(), sink.plays_inline()))
    }
}

impl WidgetSurface for HeadlessSurface {
    fn show_status(&self, kind: StatusKind, message: &str) {
        let mut state = self.state.lock();
        state.snapshot.status_kind = kind;
        state.snapshot.status_text = message.to_string();
        state.status_history.push((kind, message.to_string()));
    }

    fn set_start_enabled(&self, enabled: bool) {
        self.state.lock().snapshot.start_enabled = enabled;
    }

    fn set_layout(&self, layout: ControlLayout) {
        self.state.lock().snapshot.layout = layout;
    }

    fn replace_audio_output(&self, sink: Box<dyn MediaSink>) {
        let mut state = self.state.lock();
        state.snapshot.audio_track = Some(sink.track_sid().to_string());
        if let Some(mut previous) = state.audio.replace(sink) {
            previous.detach();
        }
    }

    fn clear_audio_output(&self) {
        let mut state = self.state.lock();
        state.snapshot.audio_track = None;
        if let Some(mut previous) = state.audio.take() {
            previous.detach();
        }
    }

    fn render_catalog(&self, view: &CatalogView) {
        self.state.lock().snapshot.catalog = Some(view.clone());
    }
}
