//! Patchbay routing engine
//!
//! This crate provides the core of the patchbay hub: it turns decoded
//! control-surface samples into OSC messages for the audio and visual
//! engines, cycles through configured modes, and supervises the engine
//! child processes.
//!
//! # Architecture
//!
//! - A TOML config compiles into a [`ModeRegistry`]: an ordered mode table
//!   with per-mode button and pot bindings, validated up front.
//! - The [`ControlRouter`] core routes one sample at a time: edge-detected
//!   button presses fire their bound actions, pot readings map onto their
//!   configured output range, and the mode-advance button cycles modes.
//! - The [`ProcessSupervisor`] keeps at most one `sclang` and one
//!   `processing-java` child alive per kind, restarting the right pair on
//!   every mode change.
//! - [`run_router_actor`] ties the three together in a single task fed by
//!   a command channel, emitting all activity as a [`RouterEvent`] stream.
//!   The serial source and the console simulator feed the same channel, so
//!   real and simulated input share one code path.
//!
//! # Example
//!
//! ```rust,no_run
//! use patch_router::{ControlRouter, HubConfig, ModeRegistry};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HubConfig::load(Path::new("patchbay.toml"))?;
//! let registry = ModeRegistry::from_config(&config)?;
//! let router = ControlRouter::new(registry);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod osc;
pub mod registry;
pub mod serial_source;
pub mod supervisor;

// Re-export actor types
pub use actor::{run_router_actor, RouterCommand, RouterStatus};

// Re-export config types
pub use config::{HubConfig, LauncherConfig, ParamValue, SerialConfig, SystemConfig, ValueFormat};

// Re-export routing core types
pub use engine::{ControlRouter, ModeChange, SampleOutcome};
pub use registry::{ActionSpec, ModeDefinition, ModeRegistry, PotBinding};

// Re-export event and error types
pub use error::{ConfigError, RouterError};
pub use events::RouterEvent;

// Re-export I/O types
pub use osc::{to_osc_args, OscSender, OutboundMessage};
pub use serial_source::{run_serial_source, SourceCommand, SourceExit};
pub use supervisor::{EngineKind, EngineStatus, LaunchPlan, ProcessSupervisor};
