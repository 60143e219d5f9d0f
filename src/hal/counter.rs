//! Debounced pulse counters shared between edge handlers and the main
//! cycle.
//!
//! The handler side runs in interrupt-like context: bounded time, no
//! blocking, atomics only. The count and the last-accepted-edge timestamp
//! live in one struct, and a compare-exchange on the timestamp keeps the
//! read-compare-update sequence a single unit, so a bounced edge can never
//! slip in between the check and the accept.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Pulses faster than this are treated as contact bounce.
pub const COUNTER_DEBOUNCE_MS: u64 = 150;

static CLOCK_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic milliseconds since the first call in this process.
pub fn monotonic_ms() -> i64 {
    CLOCK_EPOCH.get_or_init(Instant::now).elapsed().as_millis() as i64
}

#[derive(Debug)]
pub struct PulseCounter {
    debounce_ms: i64,
    count: AtomicU32,
    last_edge_ms: AtomicI64,
}

impl PulseCounter {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms: debounce_ms as i64,
            count: AtomicU32::new(0),
            // far enough in the past that the first edge always counts
            last_edge_ms: AtomicI64::new(i64::MIN / 2),
        }
    }

    /// Records a rising edge happening now.
    pub fn record_edge(&self) {
        self.record_edge_at(monotonic_ms());
    }

    /// Records a rising edge at `now_ms`; edges inside the debounce window
    /// are ignored.
    pub fn record_edge_at(&self, now_ms: i64) {
        loop {
            let last = self.last_edge_ms.load(Ordering::Acquire);
            if now_ms - last < self.debounce_ms {
                return;
            }
            if self
                .last_edge_ms
                .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.count.fetch_add(1, Ordering::AcqRel);
                return;
            }
        }
    }

    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Counter value folded into a 16-bit register word.
    pub fn as_register(&self) -> u16 {
        (self.value() & 0xFFFF) as u16
    }
}
