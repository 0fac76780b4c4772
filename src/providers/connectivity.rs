//! Connectivity monitor seam.
//!
//! The coordinator only needs a synchronous "is the network usable right
//! now" answer; the platform monitor that keeps it current lives outside
//! this crate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Current network availability.
///
/// Called on every gate check, so implementations should answer from
/// cached state without blocking.
#[cfg_attr(test, mockall::automock)]
pub trait Connectivity: Send + Sync {
    /// Returns true if the network is usable.
    fn is_available(&self) -> bool;
}

/// Connectivity flag flipped by whoever observes the platform network state.
#[derive(Debug)]
pub struct StaticConnectivity {
    available: AtomicBool,
}

impl StaticConnectivity {
    /// Creates a monitor with the given initial state.
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    /// Updates the network state.
    pub fn set_available(&self, available: bool) {
        let previous = self.available.swap(available, Ordering::SeqCst);
        if previous != available {
            tracing::info!(available, "Connectivity changed");
        }
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for StaticConnectivity {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_connectivity_toggles() {
        let connectivity = StaticConnectivity::new(false);
        assert!(!connectivity.is_available());

        connectivity.set_available(true);
        assert!(connectivity.is_available());
    }

    #[test]
    fn default_is_online() {
        assert!(StaticConnectivity::default().is_available());
    }
}
