//! Wall-clock cost of `/scan` requests, including the model round-trip and
//! failed attempts. Grounded completions run for tens of seconds, so the
//! histogram works in whole milliseconds.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Shortest scan worth distinguishing.
const FLOOR_MS: u64 = 1;
/// Ten minutes; anything slower is recorded at the ceiling.
const CEILING_MS: u64 = 600_000;

/// Snapshot served by `GET /stats/latency`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub samples: u64,
}

pub struct LatencyStats {
    scans: Mutex<Histogram<u64>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        let scans = Histogram::new_with_bounds(FLOOR_MS, CEILING_MS, 3)
            .expect("valid histogram bounds");
        Self { scans: Mutex::new(scans) }
    }

    pub fn record(&self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(CEILING_MS);
        self.record_ms(ms);
    }

    pub fn record_ms(&self, ms: u64) {
        if let Ok(mut h) = self.scans.lock() {
            // Clamped into the bounds, so this cannot fail.
            let _ = h.record(ms.clamp(FLOOR_MS, CEILING_MS));
        }
    }

    pub fn summary(&self) -> LatencySummary {
        let Ok(h) = self.scans.lock() else {
            return LatencySummary::default();
        };
        if h.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            p50_ms: Some(h.value_at_quantile(0.50)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            samples: h.len(),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
