//! # Voice Widget Core - Storefront Call Session Controller
//!
//! This crate drives the "talk to the shop" voice widget embedded in a
//! storefront page:
//! - **readiness**: waits for the asynchronously loaded RTC client library
//! - **backend**: obtains a connection credential and dispatches the remote agent
//! - **session**: the call state machine that owns the RTC connection
//! - **presenter**: maps call progress onto status text and call controls
//!
//! The RTC library, the page and the backend are collaborators expressed as
//! traits ([`rtc::RtcLibrary`], [`WidgetSurface`], [`SessionBackend`]). The
//! crate ships in-memory implementations of the first two so the controller
//! runs headless.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voicewidget_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> WidgetResult<()> {
//!     let namespace = Arc::new(GlobalNamespace::new());
//!     namespace.install("LivekitClient", Arc::new(MemoryRtcLibrary::new()));
//!
//!     let surface = Arc::new(HeadlessSurface::new());
//!     let config = WidgetConfig::new("http://localhost:5000");
//!     let widget = Widget::bootstrap(config, namespace, surface.clone()).await?;
//!
//!     widget.on_start_clicked().await;
//!     println!("{}", surface.snapshot().status_text);
//!
//!     widget.on_end_clicked().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod presenter;
pub mod readiness;
pub mod rtc;
pub mod session;

// Re-export main types
pub use backend::{Credential, HttpSessionBackend, SessionBackend};
pub use bootstrap::Widget;
pub use catalog::{Catalog, CatalogClient, CatalogView, Product, ProductCard, ProductLine, format_price, render_catalog};
pub use config::{AgentConfig, IdentityConfig, ReadinessConfig, WidgetConfig};
pub use error::{FailureKind, WidgetError, WidgetResult};
pub use events::{EventStream, SessionEvent};
pub use presenter::{ControlLayout, HeadlessSurface, StatusKind, StatusPresenter, SurfaceSnapshot, WidgetSurface};
pub use readiness::LibraryDetector;
pub use session::{AttemptId, AttemptInfo, CallSession, CallState, EndOutcome, StartOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::rtc::{GlobalNamespace, LibraryNamespace, MemoryRtcLibrary, RtcConnection, RtcLibrary};
    pub use crate::{
        CallSession, CallState, EndOutcome, HeadlessSurface, SessionBackend, StartOutcome, Widget, WidgetConfig,
        WidgetError, WidgetResult, WidgetSurface,
    };
}
