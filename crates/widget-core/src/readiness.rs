//! RTC library readiness detection
//!
//! The RTC client library is loaded asynchronously by the page and may show
//! up late or not at all. [`LibraryDetector`] probes the shared namespace
//! immediately and then on a fixed interval until a deadline, yielding a
//! single awaitable result.
//!
//! # Probe Order
//!
//! The library has been published under several names over time. Each name
//! becomes a [`NamedProbe`]; probes run in configuration order on every tick
//! and the first one that finds a library exposing its connection
//! constructor wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ReadinessConfig;
use crate::error::{WidgetError, WidgetResult};
use crate::rtc::{LibraryHandle, LibraryNamespace};

/// One candidate name to look up in the namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedProbe {
    name: String,
}

impl NamedProbe {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look the name up; a library without its connection constructor does not count
    pub fn probe(&self, namespace: &dyn LibraryNamespace) -> Option<LibraryHandle> {
        namespace
            .lookup(&self.name)
            .filter(|library| library.supports_connections())
    }
}

/// Waits for the RTC library to become available
pub struct LibraryDetector {
    namespace: Arc<dyn LibraryNamespace>,
    probes: Vec<NamedProbe>,
    poll_interval: Duration,
    deadline: Duration,
}

impl LibraryDetector {
    pub fn new(namespace: Arc<dyn LibraryNamespace>, config: &ReadinessConfig) -> Self {
        Self {
            namespace,
            probes: config.candidates.iter().map(NamedProbe::new).collect(),
            poll_interval: config.poll_interval(),
            deadline: config.deadline(),
        }
    }

    pub fn probes(&self) -> &[NamedProbe] {
        &self.probes
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run every probe once, in priority order
    pub fn probe_once(&self) -> Option<LibraryHandle> {
        self.probes.iter().find_map(|probe| {
            probe.probe(self.namespace.as_ref()).inspect(|library| {
                debug!(
                    "RTC library found under '{}' (version {})",
                    probe.name(),
                    library.version().unwrap_or("unknown")
                );
            })
        })
    }

    /// Resolve with the library handle, or fail once the deadline has elapsed
    ///
    /// Resolves without waiting when the first probe succeeds. Never fails
    /// before the deadline.
    pub async fn await_ready(&self) -> WidgetResult<LibraryHandle> {
        if let Some(library) = self.probe_once() {
            return Ok(library);
        }

        debug!(
            "RTC library not loaded yet, polling every {:?} for up to {:?}",
            self.poll_interval, self.deadline
        );

        let started = Instant::now();
        let poll = async {
            let mut ticker = time::interval_at(started + self.poll_interval, self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(library) = self.probe_once() {
                    return library;
                }
            }
        };

        match time::timeout(self.deadline, poll).await {
            Ok(library) => {
                info!("RTC client library loaded after {:?}", started.elapsed());
                Ok(library)
            }
            Err(_) => {
                error!(
                    "RTC library not found. Related namespace entries: {:?}",
                    self.related_names()
                );
                Err(WidgetError::LibraryUnavailable {
                    waited_ms: self.deadline.as_millis() as u64,
                })
            }
        }
    }

    /// Published names that look like the library, for diagnostics
    fn related_names(&self) -> Vec<String> {
        let needles: Vec<String> = self.probes.iter().map(|p| p.name().to_lowercase()).collect();
        self.namespace
            .names()
            .into_iter()
            .filter(|name| {
                let name = name.to_lowercase();
                needles.iter().any(|needle| name.contains(needle.as_str()))
            })
            .collect()
    }
}
