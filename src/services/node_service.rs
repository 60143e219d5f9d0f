//! Application loop tying the register bank, the slave engine and the
//! field I/O together.
//!
//! One cycle: mirror counters/digital inputs/power state into the bank,
//! give the engine one bounded poll, then act on command registers written
//! by the master. Actuator pulses block the cycle and run to completion;
//! any bytes that arrived on the bus meanwhile are drained so the next
//! receive starts on a frame boundary.

use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;
use crate::devices::{to_register_word, AnalogReader, ClimateSensor, ANALOG_CHANNELS};
use crate::hal::counter::PulseCounter;
use crate::hal::gpio::DigitalInput;
use crate::hal::power::PowerMonitor;
use crate::hal::valve::ValveChannel;
use crate::modbus::engine::SlaveEngine;
use crate::modbus::registers::RegisterBank;
use crate::modbus::transport::UartLink;
use crate::output::{broadcast, ConsoleDataLog, DataLogSink, FileDataLog, LogRecord};
use crate::utils::error::NodeError;

// Register map of this node. The address set is fixed at build time; the
// master only ever changes values.
pub const IREG_ANALOG_BASE: u16 = 0; // 0..=3, millivolts
pub const IREG_COUNTER_1: u16 = 4;
pub const IREG_COUNTER_2: u16 = 5;
pub const DISCRETE_INPUT_1: u16 = 6;
pub const DISCRETE_INPUT_2: u16 = 7;
pub const IREG_TEMPERATURE: u16 = 8; // degrees C x100
pub const IREG_HUMIDITY: u16 = 9; // %RH x100
pub const HREG_TRIGGER_ANALOG: u16 = 100;
pub const HREG_TRIGGER_CLIMATE: u16 = 101;
pub const HREG_VALVE_BASE: u16 = 200; // open/close pairs per channel

/// Builds the register bank for this node's fixed map, all values zeroed.
pub fn node_register_bank(valve_channels: u8) -> RegisterBank {
    let mut bank = RegisterBank::new();
    for channel in 0..ANALOG_CHANNELS as u16 {
        bank.add_input(IREG_ANALOG_BASE + channel, 0);
    }
    bank.add_input(IREG_COUNTER_1, 0);
    bank.add_input(IREG_COUNTER_2, 0);
    bank.add_discrete(DISCRETE_INPUT_1, false);
    bank.add_discrete(DISCRETE_INPUT_2, false);
    bank.add_input(IREG_TEMPERATURE, 0);
    bank.add_input(IREG_HUMIDITY, 0);
    bank.add_holding(HREG_TRIGGER_ANALOG, 0);
    bank.add_holding(HREG_TRIGGER_CLIMATE, 0);
    for address in HREG_VALVE_BASE..HREG_VALVE_BASE + valve_channels as u16 * 2 {
        bank.add_holding(address, 0);
    }
    bank
}

/// Field I/O handed to the service at startup.
pub struct NodeHardware {
    pub analog: Arc<dyn AnalogReader>,
    pub climate: Arc<dyn ClimateSensor>,
    pub digital_inputs: Vec<Box<dyn DigitalInput>>,
    pub valves: Vec<ValveChannel>,
    pub counters: Vec<Arc<PulseCounter>>,
    pub power: Option<Arc<PowerMonitor>>,
}

pub struct NodeService<L: UartLink> {
    config: Config,
    engine: SlaveEngine<L>,
    bank: RegisterBank,
    hardware: NodeHardware,
    sinks: Vec<Box<dyn DataLogSink>>,
    power_was_ok: bool,
}

impl<L: UartLink> NodeService<L> {
    pub fn new(config: Config, engine: SlaveEngine<L>, hardware: NodeHardware) -> Self {
        info!("🚀 Initializing ISURNODE service");
        info!("🏷️  Node: {} [{}]", config.get_node_name(), config.get_node_uuid());
        info!("📦 Version: {}", config.get_node_version());
        info!(
            "🔌 Serial: {} @ {} baud, slave address {}",
            config.serial_port, config.baud_rate, config.slave_address
        );
        info!(
            "📡 I/O: {} valve channel(s), {} pulse counter(s), {} digital input(s)",
            hardware.valves.len(),
            hardware.counters.len(),
            hardware.digital_inputs.len()
        );

        let bank = node_register_bank(config.valve_channels);

        let mut sinks: Vec<Box<dyn DataLogSink>> = Vec::new();
        sinks.push(Box::new(ConsoleDataLog));
        if config.datalog.enabled {
            info!("📝 Data log enabled: {}", config.datalog.path);
            sinks.push(Box::new(FileDataLog::new(&config.datalog.path)));
        }

        info!("✅ Register map set up complete");
        Self {
            config,
            engine,
            bank,
            hardware,
            sinks,
            power_was_ok: true,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn DataLogSink>) {
        info!("📤 Added {} sink to {}", sink.sink_type(), sink.destination());
        self.sinks.push(sink);
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut RegisterBank {
        &mut self.bank
    }

    /// Runs cycles until ctrl-c.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        info!(
            "🔄 Node cycle running every {} ms, waiting for master polls",
            self.config.cycle_interval_ms
        );
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("🛑 Stopping node service...");
                    break;
                }
                _ = sleep(Duration::from_millis(self.config.cycle_interval_ms)) => {
                    self.run_cycle().await?;
                }
            }
        }
        Ok(())
    }

    /// One full cycle: refresh mirrored inputs, poll the bus, act on
    /// command registers.
    pub async fn run_cycle(&mut self) -> Result<(), NodeError> {
        self.refresh_inputs()?;
        self.engine.poll(&mut self.bank)?;
        self.service_commands().await?;
        Ok(())
    }

    /// Mirrors counters, digital inputs and power state into the bank.
    /// Counters may still increment mid-refresh; the next cycle picks the
    /// newer value up.
    fn refresh_inputs(&mut self) -> Result<(), NodeError> {
        for (index, counter) in self.hardware.counters.iter().enumerate() {
            self.bank
                .set_input(IREG_COUNTER_1 + index as u16, counter.as_register())?;
        }

        for (index, input) in self.hardware.digital_inputs.iter().enumerate() {
            self.bank
                .set_discrete(DISCRETE_INPUT_1 + index as u16, input.is_high())?;
        }

        if let Some(power) = &self.hardware.power {
            let power_ok = power.is_power_ok();
            if power_ok != self.power_was_ok {
                if power_ok {
                    info!("🔋 External power restored");
                } else {
                    warn!("🪫 External power failed, running on backup supply");
                }
                self.power_was_ok = power_ok;
            }
        }

        Ok(())
    }

    /// Acts on command registers the master wrote since the last cycle.
    async fn service_commands(&mut self) -> Result<(), NodeError> {
        if self.bank.get_holding(HREG_TRIGGER_ANALOG)? == 1 {
            self.refresh_analog().await?;
            self.bank.set_holding(HREG_TRIGGER_ANALOG, 0)?;
            self.engine.drain()?;
        }

        if self.bank.get_holding(HREG_TRIGGER_CLIMATE)? == 1 {
            self.refresh_climate().await?;
            // cleared even when the read failed, a stuck command would
            // re-trigger forever
            self.bank.set_holding(HREG_TRIGGER_CLIMATE, 0)?;
            self.engine.drain()?;
        }

        for channel in 0..self.hardware.valves.len() {
            let open_addr = HREG_VALVE_BASE + channel as u16 * 2;
            let close_addr = open_addr + 1;

            if self.bank.get_holding(open_addr)? == 1 {
                self.hardware.valves[channel].pulse_open();
                self.bank.set_holding(open_addr, 0)?;
                self.engine.drain()?;
                let name = self.hardware.valves[channel].name().to_string();
                broadcast(
                    &self.sinks,
                    &LogRecord::new("valve_pulse", json!({"channel": name, "action": "open"})),
                )
                .await;
            }

            if self.bank.get_holding(close_addr)? == 1 {
                self.hardware.valves[channel].pulse_close();
                self.bank.set_holding(close_addr, 0)?;
                self.engine.drain()?;
                let name = self.hardware.valves[channel].name().to_string();
                broadcast(
                    &self.sinks,
                    &LogRecord::new("valve_pulse", json!({"channel": name, "action": "close"})),
                )
                .await;
            }
        }

        Ok(())
    }

    /// Reads every analog channel into its input register, in millivolts.
    /// A failed channel keeps its previous value.
    async fn refresh_analog(&mut self) -> Result<(), NodeError> {
        let mut readings = Vec::new();
        for channel in 0..ANALOG_CHANNELS {
            match self.hardware.analog.read_volts(channel).await {
                Ok(volts) => {
                    let millivolts = (volts * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16;
                    self.bank
                        .set_input(IREG_ANALOG_BASE + channel as u16, millivolts)?;
                    info!("  ADC[{}] = {} mV", channel, millivolts);
                    readings.push(json!({"channel": channel, "mv": millivolts}));
                }
                Err(e) => {
                    error!("Error reading analog channel {}: {}", channel, e);
                }
            }
        }
        broadcast(
            &self.sinks,
            &LogRecord::new("analog_refresh", json!({ "readings": readings })),
        )
        .await;
        Ok(())
    }

    /// Reads the climate sensor into the x100 fixed-point registers. On
    /// failure the registers keep their previous values.
    async fn refresh_climate(&mut self) -> Result<(), NodeError> {
        match self.hardware.climate.read().await {
            Ok(reading) => {
                self.bank
                    .set_input(IREG_TEMPERATURE, to_register_word(reading.temperature))?;
                self.bank
                    .set_input(IREG_HUMIDITY, to_register_word(reading.humidity))?;
                info!(
                    "  SHT30: Temp={:.2}C, Hum={:.2}%",
                    reading.temperature, reading.humidity
                );
                broadcast(
                    &self.sinks,
                    &LogRecord::new(
                        "climate_refresh",
                        json!({"temperature": reading.temperature, "humidity": reading.humidity}),
                    ),
                )
                .await;
            }
            Err(e) => {
                error!("Error reading SHT30 sensor: {}", e);
            }
        }
        Ok(())
    }
}
