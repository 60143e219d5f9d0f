use anyhow::Result;
use clap::{Arg, Command};
use log::info;
use std::sync::Arc;
use std::time::Duration;

use isurnode::cli::handle_subcommands;
use isurnode::config::Config;
use isurnode::devices::{SimulatedAnalogInput, SimulatedClimateSensor};
use isurnode::hal::{NullOutput, PowerMonitor, PulseCounter, StaticInput, ValveChannel};
use isurnode::modbus::{RtuTimings, RtuTransport, SerialLink, SlaveEngine};
use isurnode::services::{spawn_heartbeat, NodeHardware, NodeService, HEARTBEAT_PERIOD};

fn build_cli() -> Command {
    Command::new("isurnode")
        .about("Modbus RTU slave firmware for an industrial I/O node")
        .version(isurnode::VERSION)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Serial port device"),
        )
        .arg(Arg::new("baud").short('b').long("baud").help("Baud rate"))
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .help("Modbus slave address"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .help("Cycle interval in milliseconds"),
        )
        .subcommand(
            Command::new("initconfig")
                .about("Write the configuration to a file")
                .arg(Arg::new("path").default_value("node.toml")),
        )
        .subcommand(Command::new("showconfig").about("Print the effective configuration"))
        .subcommand(Command::new("listports").about("List available serial ports"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();
    let config =
        Config::from_matches(&matches).map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let handled = handle_subcommands(&matches, &config)
        .await
        .map_err(|e| anyhow::anyhow!("Command failed: {}", e))?;
    if handled {
        return Ok(());
    }

    info!("Starting ISURNODE RTU slave...");

    let link = SerialLink::open(
        &config.serial_port,
        config.baud_rate,
        config.data_bits,
        config.stop_bits,
        &config.parity,
    )?;
    let timings = RtuTimings::from_line(config.baud_rate, config.data_bits, config.stop_bits);
    // Board integrations hang the RS-485 driver-enable line and the RX/TX
    // LEDs onto the transport here via their GPIO library.
    let transport = RtuTransport::new(link, timings);
    let engine = SlaveEngine::new(transport, vec![config.slave_address]);

    let counters = vec![
        Arc::new(PulseCounter::new(config.counter_debounce_ms)),
        Arc::new(PulseCounter::new(config.counter_debounce_ms)),
    ];

    let mut valves = Vec::new();
    for channel in 0..config.valve_channels {
        valves.push(ValveChannel::new(
            format!("EV{}", channel),
            Box::new(NullOutput),
            Box::new(NullOutput),
            Duration::from_millis(config.valve_pulse_ms),
        ));
    }

    let hardware = NodeHardware {
        analog: Arc::new(SimulatedAnalogInput::new()),
        climate: Arc::new(SimulatedClimateSensor::new()),
        digital_inputs: vec![Box::new(StaticInput(false)), Box::new(StaticInput(false))],
        valves,
        counters,
        power: Some(Arc::new(PowerMonitor::new(config.power_debounce_ms))),
    };

    let _heartbeat = spawn_heartbeat(Box::new(NullOutput), HEARTBEAT_PERIOD);

    let mut service = NodeService::new(config, engine, hardware);
    service.run().await?;

    info!("👋 Node stopped");
    Ok(())
}
