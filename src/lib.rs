//! Industrial I/O Node Firmware
//!
//! This library implements a Modbus RTU slave for an industrial I/O node:
//! analog channels, climate readings, pulse counters and digital inputs
//! are exposed as register tables to a polling master, and holding
//! registers carry commands back (sensor refresh triggers, valve pulses).

pub mod cli;
pub mod config;
pub mod devices;
pub mod hal;
pub mod modbus;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use modbus::{PollOutcome, RegisterBank, RtuTimings, RtuTransport, SerialLink, SlaveEngine};
pub use services::{NodeHardware, NodeService};
pub use utils::error::NodeError;

pub const VERSION: &str = "1.0.0";
