//! Shared namespace the RTC library is published under

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::LibraryHandle;

/// Read access to the host environment's shared namespace
///
/// A page loads the RTC library asynchronously; until that happens, lookups
/// return `None`.
pub trait LibraryNamespace: Send + Sync {
    fn lookup(&self, name: &str) -> Option<LibraryHandle>;

    /// All names currently published, for diagnostics
    fn names(&self) -> Vec<String>;
}

/// In-process namespace that libraries can be installed into at any time
#[derive(Default)]
pub struct GlobalNamespace {
    entries: RwLock<HashMap<String, LibraryHandle>>,
}

impl GlobalNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a library under `name`, replacing any previous entry
    pub fn install(&self, name: impl Into<String>, library: LibraryHandle) {
        let name = name.into();
        debug!("Installing RTC library under '{}'", name);
        self.entries.write().insert(name, library);
    }

    /// Remove a published entry, returning it if present
    pub fn remove(&self, name: &str) -> Option<LibraryHandle> {
        self.entries.write().remove(name)
    }
}

impl LibraryNamespace for GlobalNamespace {
    fn lookup(&self, name: &str) -> Option<LibraryHandle> {
        self.entries.read().get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::MemoryRtcLibrary;
    use std::sync::Arc;

    #[test]
    fn install_lookup_remove() {
        let ns = GlobalNamespace::new();
        assert!(ns.lookup("LivekitClient").is_none());

        ns.install("LivekitClient", Arc::new(MemoryRtcLibrary::new()));
        ns.install("analytics", Arc::new(MemoryRtcLibrary::new()));
        assert!(ns.lookup("LivekitClient").is_some());
        assert_eq!(ns.names(), vec!["LivekitClient".to_string(), "analytics".to_string()]);

        assert!(ns.remove("LivekitClient").is_some());
        assert!(ns.lookup("LivekitClient").is_none());
    }
}
