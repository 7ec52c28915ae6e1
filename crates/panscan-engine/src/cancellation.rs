//! Cooperative scan cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Write-once stop flag for a scan session.
///
/// Once requested, the flag stays set for the remainder of the session;
/// `reset` is only called when a new session begins. Checked between
/// tasks — in-flight file scans are never interrupted.
#[derive(Debug, Clone, Default)]
pub struct ScanCancellation {
    flag: Arc<AtomicBool>,
}

impl ScanCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the scan to stop after currently running tasks complete.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear the flag at the start of a new session.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}
