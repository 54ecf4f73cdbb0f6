//! Shared connectivity flag.
//!
//! The platform layer flips this from its own connectivity callbacks and
//! separately calls `SyncDispatcher::notify_online` on the offline→online
//! transition; the dispatcher only ever reads the flag.

use std::sync::atomic::{AtomicBool, Ordering};

use ordersync_core::NetworkMonitor;

/// `AtomicBool`-backed network monitor.
#[derive(Debug)]
pub struct NetworkState {
    offline: AtomicBool,
}

impl NetworkState {
    pub fn new(online: bool) -> Self {
        Self { offline: AtomicBool::new(!online) }
    }

    pub fn set_online(&self) {
        self.offline.store(false, Ordering::Release);
    }

    pub fn set_offline(&self) {
        self.offline.store(true, Ordering::Release);
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for NetworkState {
    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }
}
