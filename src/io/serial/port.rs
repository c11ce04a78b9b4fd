// src/io/serial/port.rs
//
// Serial port access: the byte-level link trait, its serialport-backed
// implementation, and port enumeration.

use std::io::{Read, Write};
use std::time::Duration;

use serde::Serialize;

use crate::io::error::LinkError;

// ============================================================================
// Configuration
// ============================================================================

/// Settings for opening one serial port.
#[derive(Clone, Debug)]
pub struct SerialConfig {
    /// OS port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    pub baud_rate: u32,
    /// Blocking-read timeout. A timed-out read is not an error; it is the
    /// poll point at which the read loop observes cancellation.
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        SerialConfig {
            port: port.into(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(50),
        }
    }
}

// ============================================================================
// Link Trait
// ============================================================================

/// An open serial device. Byte-level primitives only; text handling and
/// session lifecycle live above this.
///
/// `read` returns as soon as any bytes are available, `Ok(0)` when the peer
/// end is torn down, and `ErrorKind::TimedOut` when the poll window elapses
/// with no data.
pub trait SerialLink: Send {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write the whole buffer and flush. Completes or fails; no partial
    /// state is exposed.
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Release the OS handle. Consumes the link so it cannot be used after.
    fn close(self: Box<Self>);
}

/// Opens links. The session goes through this seam so tests can substitute
/// a scripted link for real hardware.
pub trait PortOpener: Send + Sync {
    fn open(&self, config: &SerialConfig) -> Result<Box<dyn SerialLink>, LinkError>;
}

// ============================================================================
// Serialport-Backed Implementation
// ============================================================================

/// Link over a physical (or pty) serial device.
pub struct PhysicalPort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialLink for PhysicalPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn close(self: Box<Self>) {
        tlog!("[serial] Closed {}", self.name);
        // Dropping the port releases the OS handle
    }
}

/// Opens real serial devices via the serialport crate.
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, config: &SerialConfig) -> Result<Box<dyn SerialLink>, LinkError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| LinkError::DeviceUnavailable(format!("{}: {}", config.port, e)))?;

        tlog!(
            "[serial] Opened {} at {} baud",
            config.port, config.baud_rate
        );

        Ok(Box::new(PhysicalPort {
            port,
            name: config.port.clone(),
        }))
    }
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// List available serial ports.
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The cu (calling unit) devices are non-blocking and preferred for outgoing
/// connections; the tty devices block on open waiting for carrier detect.
pub fn list_ports() -> Result<Vec<SerialPortInfo>, LinkError> {
    let ports = serialport::available_ports()
        .map_err(|e| LinkError::Io(format!("Failed to enumerate ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => {
                    ("PCI".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_open_missing_device_is_unavailable() {
        let config = SerialConfig::new("/dev/seriline-no-such-port");
        match SystemPortOpener.open(&config) {
            Err(LinkError::DeviceUnavailable(msg)) => {
                assert!(msg.contains("seriline-no-such-port"));
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other.map(|_| ())),
        }
    }
}
