//! Debounced power-good monitoring.
//!
//! The edge handler only records the debounced line state; reacting to a
//! failure (logging, shedding load) happens in the main cycle, which polls
//! [`PowerMonitor::is_power_ok`] and compares against what it saw last.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::hal::counter::monotonic_ms;

/// Power-good transitions faster than this are ignored as glitches.
pub const POWER_DEBOUNCE_MS: u64 = 1000;

#[derive(Debug)]
pub struct PowerMonitor {
    debounce_ms: i64,
    power_ok: AtomicBool,
    last_edge_ms: AtomicI64,
}

impl PowerMonitor {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms: debounce_ms as i64,
            power_ok: AtomicBool::new(true),
            last_edge_ms: AtomicI64::new(i64::MIN / 2),
        }
    }

    /// Records a power-good line transition happening now.
    pub fn record_transition(&self, power_ok: bool) {
        self.record_transition_at(power_ok, monotonic_ms());
    }

    /// Records a transition at `now_ms`; transitions inside the debounce
    /// window are ignored.
    pub fn record_transition_at(&self, power_ok: bool, now_ms: i64) {
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
                self.power_ok.store(power_ok, Ordering::Release);
                return;
            }
        }
    }

    pub fn is_power_ok(&self) -> bool {
        self.power_ok.load(Ordering::Acquire)
    }
}
