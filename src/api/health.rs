//! Shared health state for the /health endpoint.
//! Updated by the /scan handler around every model round-trip.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared scan counters. Updated by the scan handler, read by API.
#[derive(Default)]
pub struct HealthState {
    pub scans_started: AtomicU64,
    pub scans_failed: AtomicU64,
    /// Scans currently waiting on the model.
    pub in_flight: AtomicU64,
    /// Millisecond timestamp of the last finished scan (0 = none).
    pub last_scan_at_ms: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scan_finished(&self, ok: bool, at_ms: u64) {
        if !ok {
            self.scans_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.last_scan_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn scans_started(&self) -> u64 {
        self.scans_started.load(Ordering::Relaxed)
    }

    pub fn scans_failed(&self) -> u64 {
        self.scans_failed.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn last_scan_at_ms(&self) -> u64 {
        self.last_scan_at_ms.load(Ordering::Relaxed)
    }
}
