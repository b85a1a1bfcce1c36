//! Shared metrics state written by every request and drained by the monitor.

use std::sync::atomic::{AtomicU64, Ordering};

use s3lab_service::{PoolStats, RequestMetrics, RequestMetricsListener};

/// Marks a register word that holds a snapshot.
const PRESENT: u64 = 1 << 63;
/// Bits per occupancy counter in a packed snapshot.
const FIELD_BITS: u32 = 21;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;

/// Holds the most recent [`PoolStats`] snapshot and the number of requests since the last sample.
///
/// Both fields are independent atomics. The snapshot register is last-write-wins:
/// every request overwrites the previous snapshot, and [`take_snapshot`](Self::take_snapshot)
/// clears it. The request counter is incremented per request and reset by
/// [`take_requests`](Self::take_requests).
#[derive(Debug, Default)]
pub struct PoolStatsRecorder {
    latest: AtomicU64,
    requests: AtomicU64,
}

impl PoolStatsRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the snapshot of one completed request.
    pub fn record(&self, stats: PoolStats) {
        self.latest.store(pack(stats), Ordering::Release);
        self.requests.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the latest snapshot and clears the register.
    ///
    /// Returns `None` if no request completed since the last call.
    pub fn take_snapshot(&self) -> Option<PoolStats> {
        unpack(self.latest.swap(0, Ordering::AcqRel))
    }

    /// Returns the number of requests since the last call and resets the counter.
    pub fn take_requests(&self) -> u64 {
        self.requests.swap(0, Ordering::AcqRel)
    }

    /// Discards the current snapshot and request count.
    pub fn reset(&self) {
        self.take_snapshot();
        self.take_requests();
    }
}

impl RequestMetricsListener for PoolStatsRecorder {
    fn on_request(&self, metrics: &RequestMetrics) {
        self.record(metrics.pool);
    }
}

/// Packs a snapshot into a single word, saturating each counter.
fn pack(stats: PoolStats) -> u64 {
    let field = |value: usize| (value as u64).min(FIELD_MASK);

    PRESENT
        | (field(stats.pending) << (2 * FIELD_BITS))
        | (field(stats.available) << FIELD_BITS)
        | field(stats.leased)
}

fn unpack(word: u64) -> Option<PoolStats> {
    if word & PRESENT == 0 {
        return None;
    }

    let field = |shift: u32| ((word >> shift) & FIELD_MASK) as usize;
    Some(PoolStats {
        pending: field(2 * FIELD_BITS),
        available: field(FIELD_BITS),
        leased: field(0),
    })
}
