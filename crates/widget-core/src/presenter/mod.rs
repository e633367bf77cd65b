//! Status presenter
//!
//! Maps session transitions onto the page: status text and styling, control
//! visibility, and the audio container. The presenter never decides
//! anything; the session tells it what happened.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::CatalogView;
use crate::error::{FailureKind, WidgetError};
use crate::rtc::MediaSink;

mod surface;

pub use surface::{HeadlessSurface, SurfaceSnapshot, WidgetSurface};

/// Styling of the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Neutral,
    Connecting,
    Connected,
    Error,
    Warning,
}

impl StatusKind {
    /// Modifier class, empty for neutral
    pub fn as_class(&self) -> &'static str {
        match self {
            Self::Neutral => "",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    /// Full class list of the status element
    pub fn css_class(&self) -> String {
        format!("call-status {}", self.as_class())
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_class())
    }
}

/// Which call control is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlLayout {
    /// Start visible, end hidden
    PreCall,
    /// End visible, start hidden
    InCall,
}

impl ControlLayout {
    pub fn start_visible(&self) -> bool {
        matches!(self, Self::PreCall)
    }

    pub fn end_visible(&self) -> bool {
        matches!(self, Self::InCall)
    }
}

/// Writes session outcomes to a [`WidgetSurface`]
#[derive(Clone)]
pub struct StatusPresenter {
    surface: Arc<dyn WidgetSurface>,
    brand: String,
}

impl StatusPresenter {
    pub fn new(surface: Arc<dyn WidgetSurface>, brand: impl Into<String>) -> Self {
        Self {
            surface,
            brand: brand.into(),
        }
    }

    pub fn surface(&self) -> &Arc<dyn WidgetSurface> {
        &self.surface
    }

    pub fn present(&self, kind: StatusKind, message: &str) {
        debug!("status [{}] {}", kind.css_class(), message);
        self.surface.show_status(kind, message);
    }

    /// Pre-call controls with the start control enabled
    pub fn reset(&self) {
        self.surface.set_layout(ControlLayout::PreCall);
        self.surface.set_start_enabled(true);
    }

    pub fn call_starting(&self) {
        self.surface.set_start_enabled(false);
        self.present(StatusKind::Connecting, &format!("Connecting to {}...", self.brand));
    }

    pub fn call_connected(&self) {
        self.surface.set_layout(ControlLayout::InCall);
        self.present(StatusKind::Connected, &self.ready_text());
    }

    /// The remote agent joined
    pub fn agent_ready(&self) {
        self.present(StatusKind::Connected, &self.ready_text());
    }

    pub fn call_ended(&self) {
        self.surface.clear_audio_output();
        self.reset();
        self.present(StatusKind::Neutral, "Call ended");
    }

    pub fn call_failed(&self, error: &WidgetError) {
        self.reset();
        let kind = match error.kind() {
            FailureKind::LibraryUnavailable => StatusKind::Warning,
            _ => StatusKind::Error,
        };
        self.present(kind, &format!("Connection failed: {error}"));
    }

    /// Put a remote audio sink in the output container, replacing any previous one
    pub fn attach_audio(&self, sink: Box<dyn MediaSink>) {
        self.surface.replace_audio_output(sink);
    }

    pub fn library_warning(&self) {
        self.present(
            StatusKind::Warning,
            "Warning: RTC client not loaded. Call feature may not work.",
        );
    }

    pub fn render_catalog(&self, view: &CatalogView) {
        self.surface.render_catalog(view);
    }

    fn ready_text(&self) -> String {
        format!("Connected! {} is ready to help you.", self.brand)
    }
}
