//! Page wiring
//!
//! [`Widget`] is what a page creates once on load: it renders the product
//! grid, puts the call controls in their pre-call layout, checks for the RTC
//! library in the background and routes control clicks to the session.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::{HttpSessionBackend, SessionBackend};
use crate::catalog::CatalogClient;
use crate::config::WidgetConfig;
use crate::error::WidgetResult;
use crate::presenter::WidgetSurface;
use crate::readiness::LibraryDetector;
use crate::rtc::LibraryNamespace;
use crate::session::{CallSession, EndOutcome, StartOutcome};

/// A bootstrapped call widget
pub struct Widget {
    session: CallSession,
    readiness_probe: JoinHandle<()>,
}

impl Widget {
    /// Bootstrap against the HTTP backend at `config.backend_url`
    pub async fn bootstrap(
        config: WidgetConfig,
        namespace: Arc<dyn LibraryNamespace>,
        surface: Arc<dyn WidgetSurface>,
    ) -> WidgetResult<Self> {
        let backend = Arc::new(HttpSessionBackend::from_config(&config)?);
        let catalog = CatalogClient::from_config(&config)?;
        Self::bootstrap_with(config, namespace, backend, catalog, surface).await
    }

    /// Bootstrap with an explicit session backend and catalog client
    pub async fn bootstrap_with(
        config: WidgetConfig,
        namespace: Arc<dyn LibraryNamespace>,
        backend: Arc<dyn SessionBackend>,
        catalog: CatalogClient,
        surface: Arc<dyn WidgetSurface>,
    ) -> WidgetResult<Self> {
        let detector = LibraryDetector::new(namespace.clone(), &config.readiness);
        let session = CallSession::with_backend(config, namespace, backend, surface)?;
        let presenter = session.presenter().clone();

        // Products first; a broken catalog never blocks the call controls
        let view = catalog.load_view().await;
        presenter.render_catalog(&view);

        presenter.reset();
        info!("Call controls ready");

        let readiness_probe = tokio::spawn(async move {
            match detector.await_ready().await {
                Ok(_) => info!("RTC client library loaded"),
                Err(e) => {
                    warn!("RTC client library did not load: {}", e);
                    presenter.library_warning();
                }
            }
        });

        Ok(Self {
            session,
            readiness_probe,
        })
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    /// Whether the background library check has finished
    pub fn readiness_settled(&self) -> bool {
        self.readiness_probe.is_finished()
    }

    /// Start control handler; errors are already on screen, so they are only logged
    pub async fn on_start_clicked(&self) -> Option<StartOutcome> {
        info!("Start call clicked");
        match self.session.start().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Error starting call: {}", e);
                None
            }
        }
    }

    /// End control handler
    pub async fn on_end_clicked(&self) -> EndOutcome {
        info!("End call clicked");
        self.session.end().await
    }
}

impl Drop for Widget {
    fn drop(&mut self) {
        self.readiness_probe.abort();
    }
}
