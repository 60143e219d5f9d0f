//! Temperature/humidity sensing (SHT30-class part on the I2C bus).
//!
//! The node never talks to the chip directly; it consumes a
//! [`ClimateReading`] or an error through the [`ClimateSensor`] seam and
//! scales the result into input registers (×100 fixed point).

use async_trait::async_trait;
use std::sync::Mutex;

use super::traits::{ClimateReading, ClimateSensor};
use crate::utils::error::NodeError;

/// Scales a reading into the ×100 fixed-point register format. The value
/// saturates at the signed 16-bit range rather than wrapping.
pub fn to_register_word(value: f32) -> u16 {
    let scaled = (value * 100.0).round();
    let clamped = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    clamped as u16
}

/// Bench stand-in for the climate sensor. `present: false` models a
/// sensor missing from the bus; reads then fail the way the chip driver
/// would.
pub struct SimulatedClimateSensor {
    reading: Mutex<ClimateReading>,
    present: bool,
}

impl SimulatedClimateSensor {
    pub fn new() -> Self {
        Self {
            reading: Mutex::new(ClimateReading {
                temperature: 20.0,
                humidity: 50.0,
            }),
            present: true,
        }
    }

    pub fn missing() -> Self {
        Self {
            reading: Mutex::new(ClimateReading {
                temperature: 0.0,
                humidity: 0.0,
            }),
            present: false,
        }
    }

    pub fn set_reading(&self, temperature: f32, humidity: f32) {
        *self.reading.lock().unwrap() = ClimateReading {
            temperature,
            humidity,
        };
    }
}

impl Default for SimulatedClimateSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClimateSensor for SimulatedClimateSensor {
    async fn read(&self) -> Result<ClimateReading, NodeError> {
        if !self.present {
            return Err(NodeError::SensorError(
                "SHT30 sensor not found on the I2C bus".to_string(),
            ));
        }
        Ok(*self.reading.lock().unwrap())
    }
}
