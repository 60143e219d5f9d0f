pub mod counter;
pub mod gpio;
pub mod power;
pub mod valve;

pub use counter::{monotonic_ms, PulseCounter, COUNTER_DEBOUNCE_MS};
pub use gpio::{DigitalInput, DigitalOutput, NullOutput, SharedInput, SharedOutput, StaticInput};
pub use power::{PowerMonitor, POWER_DEBOUNCE_MS};
pub use valve::{ValveChannel, VALVE_PULSE_MS};
