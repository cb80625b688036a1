//! Serial port scanner and control-surface matching
//!
//! Enumeration wraps the `serialport` crate; matching prefers an exact
//! USB VID/PID hit from [`usb_ids`](crate::usb_ids) and falls back to the
//! product/manufacturer strings the boards report, so the surface is found
//! even behind an unlisted clone bridge.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;
use crate::usb_ids::is_known_board;

/// Product/manufacturer substrings that identify a surface board when the
/// VID/PID is not in the table
const DESCRIPTION_HINTS: &[&str] = &["Teensy", "Arduino", "CH340"];

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyACM0, COM6)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// True when the VID/PID pair is in the known-board table
    pub fn has_known_board_id(&self) -> bool {
        matches!((self.vid, self.pid), (Some(vid), Some(pid)) if is_known_board(vid, pid))
    }

    /// True when the product or manufacturer string names a surface board
    pub fn matches_description_hint(&self) -> bool {
        [self.product.as_deref(), self.manufacturer.as_deref()]
            .into_iter()
            .flatten()
            .any(|desc| DESCRIPTION_HINTS.iter().any(|hint| desc.contains(hint)))
    }

    /// True when this port looks like the control surface
    pub fn is_control_surface(&self) -> bool {
        self.has_known_board_id() || self.matches_description_hint()
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports matching these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    // Debug/logging ports
                    "debug".to_string(),
                ],
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                let desc = port.product.as_deref().unwrap_or("Unknown");
                info!("  {} - {}", port.port, desc);
            }
        }

        Ok(result)
    }

    /// Find the control surface among the available ports
    ///
    /// An exact VID/PID hit wins over a description match. Returns `Ok(None)`
    /// when nothing plausible is connected; callers decide whether that means
    /// falling back to simulated input.
    pub fn find_control_surface(&self) -> Result<Option<SerialPortInfo>, DetectError> {
        let ports = self.enumerate_ports()?;

        if let Some(port) = ports.iter().find(|p| p.has_known_board_id()) {
            info!("Control surface at {} (known VID/PID)", port.port);
            return Ok(Some(port.clone()));
        }
        if let Some(port) = ports.into_iter().find(|p| p.matches_description_hint()) {
            info!("Control surface at {} (description match)", port.port);
            return Ok(Some(port));
        }

        debug!("No port matched the control surface");
        Ok(None)
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        for pattern in &self.config.skip_patterns {
            if port.port.contains(pattern) {
                return true;
            }
        }
        false
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
