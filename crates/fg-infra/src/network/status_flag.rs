use std::sync::atomic::{AtomicBool, Ordering};

use fg_core::ports::NetworkStatusPort;

/// Connectivity as last reported by the host.
///
/// Starts online; the host flips it from its own connectivity events.
#[derive(Debug)]
pub struct NetworkStatusFlag {
    online: AtomicBool,
}

impl NetworkStatusFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(online, "network status changed");
        }
    }
}

impl Default for NetworkStatusFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatusPort for NetworkStatusFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
