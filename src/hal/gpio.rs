//! GPIO line seams.
//!
//! Pin muxing and chip setup happen outside this crate; the node only ever
//! drives or samples a configured line. Board integrations implement these
//! traits over their GPIO library, the adapters below cover bench use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait DigitalOutput: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

pub trait DigitalInput: Send {
    fn is_high(&self) -> bool;
}

/// Output that goes nowhere, for boards without the optional lines wired.
pub struct NullOutput;

impl DigitalOutput for NullOutput {
    fn set_high(&mut self) {}
    fn set_low(&mut self) {}
}

/// Input pinned to a fixed level.
pub struct StaticInput(pub bool);

impl DigitalInput for StaticInput {
    fn is_high(&self) -> bool {
        self.0
    }
}

/// Input backed by a shared atomic level, so another context (a simulator,
/// a test, an edge watcher thread) can flip it.
pub struct SharedInput {
    level: Arc<AtomicBool>,
}

impl SharedInput {
    pub fn new(initial: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(initial)),
        }
    }

    /// Handle for the producing side.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.level)
    }
}

impl DigitalInput for SharedInput {
    fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

/// Output backed by a shared atomic level, observable from another context.
pub struct SharedOutput {
    level: Arc<AtomicBool>,
}

impl SharedOutput {
    pub fn new() -> Self {
        Self {
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.level)
    }
}

impl Default for SharedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalOutput for SharedOutput {
    fn set_high(&mut self) {
        self.level.store(true, Ordering::Release);
    }

    fn set_low(&mut self) {
        self.level.store(false, Ordering::Release);
    }
}
