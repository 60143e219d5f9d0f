use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::hal::counter::COUNTER_DEBOUNCE_MS;
use crate::hal::power::POWER_DEBOUNCE_MS;
use crate::hal::valve::VALVE_PULSE_MS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Node identification
    pub node_uuid: String,
    pub node_name: String,
    pub node_version: String,

    // Serial line settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: ParityConfig,

    // Bus settings
    pub slave_address: u8,

    // Cycle settings
    pub cycle_interval_ms: u64,

    // Edge handling and actuation
    pub counter_debounce_ms: u64,
    pub power_debounce_ms: u64,
    pub valve_pulse_ms: u64,
    pub valve_channels: u8,

    // Data log settings
    pub datalog: DataLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLogConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for DataLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "./data/node_events.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_uuid: Uuid::new_v4().to_string(),
            node_name: "ISURNODE I/O Node".to_string(),
            node_version: crate::VERSION.to_string(),

            serial_port: "/dev/ttyS0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: ParityConfig::None,

            slave_address: 6,

            cycle_interval_ms: 100,

            counter_debounce_ms: COUNTER_DEBOUNCE_MS,
            power_debounce_ms: POWER_DEBOUNCE_MS,
            valve_pulse_ms: VALVE_PULSE_MS,
            valve_channels: 4,

            datalog: DataLogConfig::default(),
        }
    }
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = matches.get_one::<String>("config") {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        // Override with command line arguments
        if let Some(port) = matches.get_one::<String>("port") {
            config.serial_port = port.clone();
        }
        if let Some(baud) = matches.get_one::<String>("baud") {
            config.baud_rate = baud.parse()?;
        }
        if let Some(address) = matches.get_one::<String>("address") {
            config.slave_address = address.parse()?;
        }
        if let Some(interval) = matches.get_one::<String>("interval") {
            config.cycle_interval_ms = interval.parse()?;
        }

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Backfill identity for configs written by older builds
        if config.node_uuid.is_empty() {
            config.node_uuid = Uuid::new_v4().to_string();
        }
        if config.node_name.is_empty() {
            config.node_name = "ISURNODE I/O Node".to_string();
        }
        if config.node_version.is_empty() {
            config.node_version = crate::VERSION.to_string();
        }

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get_node_uuid(&self) -> &str {
        &self.node_uuid
    }

    pub fn get_node_name(&self) -> &str {
        &self.node_name
    }

    pub fn get_node_version(&self) -> &str {
        &self.node_version
    }
}
