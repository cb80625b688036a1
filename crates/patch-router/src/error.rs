//! Error types for the router

use std::path::PathBuf;

use thiserror::Error;

use crate::supervisor::EngineKind;

/// Errors raised while loading or validating a config file
///
/// Any of these is fatal at startup: the router refuses to run with a config
/// it cannot fully resolve.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has the wrong shape
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config defines no modes
    #[error("config defines no modes")]
    NoModes,

    /// Two modes share the same name
    #[error("duplicate mode name: {0}")]
    DuplicateMode(String),

    /// The configured initial mode does not match any defined mode
    #[error("initial mode not defined: {0}")]
    UnknownInitialMode(String),

    /// The mode button key is not a recognized button name
    #[error("invalid mode button key: {0}")]
    InvalidModeButton(String),

    /// A button binding key is not a recognized button name
    #[error("mode {mode}: unknown button key: {key}")]
    UnknownButtonKey {
        /// Mode containing the binding
        mode: String,
        /// Offending config key
        key: String,
    },

    /// A pot binding key is not a recognized pot name
    #[error("mode {mode}: unknown pot key: {key}")]
    UnknownPotKey {
        /// Mode containing the binding
        mode: String,
        /// Offending config key
        key: String,
    },

    /// A pot binding's input range has zero width
    #[error("mode {mode}: pot {key}: degenerate input range")]
    DegenerateRange {
        /// Mode containing the binding
        mode: String,
        /// Offending config key
        key: String,
    },

    /// An OSC address does not start with '/'
    #[error("mode {mode}: OSC address must start with '/': {command}")]
    BadCommandPath {
        /// Mode containing the binding
        mode: String,
        /// Offending address
        command: String,
    },
}

/// Errors that can occur while the router is running
#[derive(Debug, Error)]
pub enum RouterError {
    /// OSC packet could not be encoded
    #[error("OSC encoding error: {0}")]
    Osc(#[from] rosc::OscError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine process could not be spawned
    #[error("failed to launch {command}: {source}")]
    SpawnFailed {
        /// Command that was attempted
        command: String,
        /// Underlying spawn error
        source: std::io::Error,
    },

    /// Engine script does not exist on disk
    #[error("script not found: {}", .0.display())]
    ScriptMissing(PathBuf),

    /// Engine process exited while it was still being launched
    #[error("{kind} engine exited during launch: {status}")]
    EngineExited {
        /// Engine that exited
        kind: EngineKind,
        /// Exit status description
        status: String,
    },
}
