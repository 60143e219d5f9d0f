use clap::ArgMatches;
use log::info;

use crate::config::Config;

/// Handles utility subcommands. Returns `true` when a subcommand ran and
/// the process should exit instead of starting the node service.
pub async fn handle_subcommands(
    matches: &ArgMatches,
    config: &Config,
) -> Result<bool, Box<dyn std::error::Error>> {
    if let Some(matches) = matches.subcommand_matches("initconfig") {
        let path = matches.get_one::<String>("path").unwrap();
        info!("📝 Writing configuration to {}", path);
        config.save_to_file(path)?;
        println!("✅ Configuration written to {}", path);
        return Ok(true);
    }

    if matches.subcommand_matches("showconfig").is_some() {
        println!("{}", toml::to_string_pretty(config)?);
        return Ok(true);
    }

    if matches.subcommand_matches("listports").is_some() {
        list_serial_ports()?;
        return Ok(true);
    }

    Ok(false)
}

pub fn list_serial_ports() -> Result<(), Box<dyn std::error::Error>> {
    println!("📡 Available Serial Ports:");

    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("   ⚠️  No serial ports found");
        return Ok(());
    }

    for (index, port) in ports.iter().enumerate() {
        println!("   {}. {}", index + 1, port.port_name);
        if let serialport::SerialPortType::UsbPort(usb_info) = &port.port_type {
            if let Some(manufacturer) = &usb_info.manufacturer {
                println!("      📱 Manufacturer: {}", manufacturer);
            }
            if let Some(serial_number) = &usb_info.serial_number {
                println!("      🔢 Serial Number: {}", serial_number);
            }
        }
    }

    Ok(())
}
