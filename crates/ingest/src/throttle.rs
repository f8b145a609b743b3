//! Per-event-kind admission gate (§4.2). Trade and quote handlers each get an
//! independent gate instance; the gate itself only needs to be serially
//! consistent within one kind, not atomic across kinds.

use equity_core::time::TimeProvider;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

const SUMMARY_INTERVAL_MS: i64 = 5_000;

/// Admits events no more often than once per `throttle_ms`, when enabled.
pub struct ThrottleGate {
    time: Arc<dyn TimeProvider>,
    enabled: bool,
    throttle_ms: i64,
    kind: &'static str,
    last_admit_ms: AtomicI64,
    dropped_since_summary: AtomicU64,
    last_summary_ms: AtomicI64,
}

impl ThrottleGate {
    pub fn new(time: Arc<dyn TimeProvider>, enabled: bool, throttle_ms: i64, kind: &'static str) -> Self {
        Self {
            time,
            enabled,
            throttle_ms,
            kind,
            last_admit_ms: AtomicI64::new(i64::MIN),
            dropped_since_summary: AtomicU64::new(0),
            last_summary_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Returns `true` if the caller may proceed. On rejection, counts the
    /// drop and — at most every five seconds — logs a summary.
    pub fn admit(&self) -> bool {
        if !self.enabled {
            return true;
        }

        let now = self.time.now_millis();
        let last = self.last_admit_ms.load(Ordering::SeqCst);
        if last == i64::MIN || now - last >= self.throttle_ms {
            self.last_admit_ms.store(now, Ordering::SeqCst);
            return true;
        }

        let dropped = self.dropped_since_summary.fetch_add(1, Ordering::SeqCst) + 1;
        let last_summary = self.last_summary_ms.load(Ordering::SeqCst);
        if last_summary == i64::MIN || now - last_summary >= SUMMARY_INTERVAL_MS {
            self.last_summary_ms.store(now, Ordering::SeqCst);
            let dropped = self.dropped_since_summary.swap(0, Ordering::SeqCst);
            info!(kind = self.kind, dropped, "throttle gate dropped events");
        }
        let _ = dropped;
        false
    }
}
