//! Control Surface Port Detection Library
//!
//! This crate provides serial port enumeration and passive auto-detection
//! of the control surface by USB metadata, so the hub works without a
//! hard-coded port name.
//!
//! # Example
//!
//! ```rust,no_run
//! use patch_detect::PortScanner;
//!
//! let scanner = PortScanner::new();
//! if let Some(port) = scanner.find_control_surface().unwrap() {
//!     println!("Surface at {}", port.port);
//! }
//! ```

pub mod error;
pub mod scanner;
pub mod usb_ids;

pub use error::DetectError;
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};
