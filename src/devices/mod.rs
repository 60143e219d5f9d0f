pub mod analog;
pub mod climate;
pub mod traits;

pub use analog::{convert_value, SimulatedAnalogInput, ANALOG_CHANNELS};
pub use climate::{to_register_word, SimulatedClimateSensor};
pub use traits::{AnalogReader, ClimateReading, ClimateSensor};
