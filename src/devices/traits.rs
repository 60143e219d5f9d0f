use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::NodeError;

/// Analog front-end: one voltage reading per channel, or an error. The
/// chip driver (ADC behind I2C) lives outside this crate; the node only
/// consumes readings.
#[async_trait]
pub trait AnalogReader: Send + Sync {
    /// Reads channel `channel` (0..=3) in volts.
    async fn read_volts(&self, channel: u8) -> Result<f32, NodeError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClimateReading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Percent relative humidity.
    pub humidity: f32,
}

/// Combined temperature/humidity sensor (SHT30-class part).
#[async_trait]
pub trait ClimateSensor: Send + Sync {
    async fn read(&self) -> Result<ClimateReading, NodeError>;
}
