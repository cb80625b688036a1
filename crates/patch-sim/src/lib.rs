//! Control Surface Simulation Library
//!
//! This crate provides a simulation layer for driving the patch router
//! without the physical control surface. It includes:
//!
//! - **VirtualSurface**: queues the same decoded samples the serial link
//!   produces, with stateful pot positions
//! - **Console source**: a line-oriented command language over any async
//!   input, used as the fallback input when no surface is attached
//!
//! # Example
//!
//! ```rust
//! use patch_protocol::AdcResolution;
//! use patch_sim::VirtualSurface;
//!
//! let mut surface = VirtualSurface::new(AdcResolution::TenBit);
//! surface.press_button(0);
//! surface.set_pot(0, 512);
//!
//! while let Some(sample) = surface.take_sample() {
//!     println!("{:?}", sample);
//! }
//! ```

pub mod console;
pub mod surface;

pub use console::{parse_command, run_console_source, ConsoleCommand, SimError, SimEvent, HELP};
pub use surface::{VirtualSurface, VirtualSurfaceConfig};
