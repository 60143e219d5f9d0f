//! Analog input channels.
//!
//! The measurement loop spans 0.322 V (zero) to 1.611 V (full scale);
//! `convert_value` maps a reading onto engineering units over that span.

use async_trait::async_trait;
use std::sync::Mutex;

use super::traits::AnalogReader;
use crate::utils::error::NodeError;

pub const ANALOG_CHANNELS: u8 = 4;

/// Loop voltage at zero engineering units.
const LOOP_ZERO_V: f32 = 0.322;
/// Loop voltage at full-scale engineering units.
const LOOP_FULL_SCALE_V: f32 = 1.611;

/// Converts a loop voltage to engineering units given the zero and
/// full-scale calibration points.
pub fn convert_value(volts: f32, zero: f32, full_scale: f32) -> f32 {
    let slope = (full_scale - zero) / (LOOP_FULL_SCALE_V - LOOP_ZERO_V);
    slope * (volts - LOOP_ZERO_V) + zero
}

/// Bench stand-in for the ADC front-end: four channels with settable
/// levels. Board builds replace this with the chip driver behind
/// [`AnalogReader`].
pub struct SimulatedAnalogInput {
    levels: Mutex<[f32; ANALOG_CHANNELS as usize]>,
}

impl SimulatedAnalogInput {
    pub fn new() -> Self {
        Self {
            levels: Mutex::new([0.0; ANALOG_CHANNELS as usize]),
        }
    }

    pub fn set_level(&self, channel: u8, volts: f32) {
        if channel < ANALOG_CHANNELS {
            self.levels.lock().unwrap()[channel as usize] = volts;
        }
    }
}

impl Default for SimulatedAnalogInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalogReader for SimulatedAnalogInput {
    async fn read_volts(&self, channel: u8) -> Result<f32, NodeError> {
        if channel >= ANALOG_CHANNELS {
            return Err(NodeError::InvalidData(format!(
                "Invalid analog channel: {}. Must be between 0 and 3",
                channel
            )));
        }
        Ok(self.levels.lock().unwrap()[channel as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_back_set_level() {
        let adc = SimulatedAnalogInput::new();
        adc.set_level(2, 1.25);
        assert_eq!(adc.read_volts(2).await.unwrap(), 1.25);
        assert_eq!(adc.read_volts(0).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected() {
        let adc = SimulatedAnalogInput::new();
        assert!(adc.read_volts(4).await.is_err());
    }

    #[test]
    fn test_convert_value_endpoints() {
        let zero = convert_value(0.322, 0.0, 100.0);
        assert!(zero.abs() < 1e-4);
        let full = convert_value(1.611, 0.0, 100.0);
        assert!((full - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_convert_value_midpoint() {
        let mid = convert_value((0.322 + 1.611) / 2.0, 0.0, 100.0);
        assert!((mid - 50.0).abs() < 1e-3);
    }
}
