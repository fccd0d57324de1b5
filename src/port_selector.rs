use crate::error::TerminalError;
use colored::Colorize;
use log::{debug, error};
use std::io::{BufRead, Write};
use tokio_serial::{SerialPortInfo, SerialPortType};

/// A serial device found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub device: String,
    pub description: String,
}

impl PortDescriptor {
    pub fn new(device: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            description: description.into(),
        }
    }
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let description = match info.port_type {
            SerialPortType::UsbPort(usb) => match (usb.product, usb.manufacturer) {
                (Some(product), Some(manufacturer)) => format!("{} ({})", product, manufacturer),
                (Some(product), None) => product,
                (None, Some(manufacturer)) => manufacturer,
                (None, None) => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
            },
            SerialPortType::PciPort => "PCI".to_string(),
            SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            SerialPortType::Unknown => "n/a".to_string(),
        };

        Self::new(info.port_name, description)
    }
}

/// Enumerates the serial devices known to the OS.
pub fn list_ports() -> Result<Vec<PortDescriptor>, TerminalError> {
    let ports = tokio_serial::available_ports().map_err(|e| {
        error!("Failed to enumerate serial ports: {}", e);
        TerminalError::NoPortsFound
    })?;

    debug!("Found {} serial ports", ports.len());
    non_empty(ports.into_iter().map(PortDescriptor::from).collect())
}

fn non_empty(ports: Vec<PortDescriptor>) -> Result<Vec<PortDescriptor>, TerminalError> {
    if ports.is_empty() {
        return Err(TerminalError::NoPortsFound);
    }
    Ok(ports)
}

pub fn print_ports(ports: &[PortDescriptor], output: &mut impl Write) -> std::io::Result<()> {
    writeln!(output, "{}", "Available COM Ports:".yellow().bold())?;
    for (i, port) in ports.iter().enumerate() {
        writeln!(output, " [{}] {} - {}", i, port.device, port.description)?;
    }
    Ok(())
}

/// Asks for a port index and returns the chosen port. There is no second
/// attempt: anything but a valid index is an error.
pub fn prompt_choice(
    ports: &[PortDescriptor],
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<PortDescriptor, TerminalError> {
    write!(output, "Select port by number: ")?;
    output.flush()?;

    let mut choice = String::new();
    input.read_line(&mut choice)?;

    parse_choice(ports, &choice)
}

fn parse_choice(ports: &[PortDescriptor], choice: &str) -> Result<PortDescriptor, TerminalError> {
    let choice = choice.trim();
    choice
        .parse::<usize>()
        .ok()
        .and_then(|index| ports.get(index))
        .cloned()
        .ok_or_else(|| TerminalError::InvalidSelection(choice.to_string()))
}
