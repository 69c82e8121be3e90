//! One-shot latch that holds the stability monitor back until the greeting
//! session has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Write-once gate.  Clones share the same latch.
#[derive(Debug, Clone, Default)]
pub struct WelcomeGate {
    fired: Arc<AtomicBool>,
}

impl WelcomeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate.  Returns `true` only for the call that opened it.
    pub fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::AcqRel);
        if first {
            log::debug!("welcome: gate fired, stability monitoring enabled");
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        assert!(!WelcomeGate::new().is_fired());
    }

    #[test]
    fn fires_once() {
        let gate = WelcomeGate::new();
        assert!(gate.fire());
        assert!(!gate.fire());
        assert!(gate.is_fired());
    }

    #[test]
    fn clones_share_the_latch() {
        let gate = WelcomeGate::new();
        let seen_by_monitor = gate.clone();
        gate.fire();
        assert!(seen_by_monitor.is_fired());
    }
}
