//! Unified event stream for the router
//!
//! All router activity (mode changes, outbound messages, engine process
//! lifecycle, serial source state) is emitted through a single event
//! channel. The hub logs the stream; tests assert on it.

use std::path::PathBuf;

use crate::supervisor::EngineKind;

/// Unified event enum for all router activity
#[derive(Debug, Clone)]
pub enum RouterEvent {
    // -------------------------------------------------------------------------
    // Mode lifecycle events
    // -------------------------------------------------------------------------
    /// The router started and activated its initial mode
    Started {
        /// Name of the initial mode
        mode: String,
    },

    /// The active mode changed
    ModeChanged {
        /// Index of the new mode in the cycle
        index: usize,
        /// Name of the new mode
        name: String,
    },

    // -------------------------------------------------------------------------
    // Dispatch events
    // -------------------------------------------------------------------------
    /// An OSC message was sent to an engine
    MessageSent {
        /// Destination engine
        target: EngineKind,
        /// OSC address pattern
        addr: String,
    },

    /// An OSC message could not be sent
    SendFailed {
        /// Destination engine
        target: EngineKind,
        /// OSC address pattern
        addr: String,
        /// Error description
        message: String,
    },

    // -------------------------------------------------------------------------
    // Engine process lifecycle events
    // -------------------------------------------------------------------------
    /// An engine process was launched and survived its launch check
    EngineStarted {
        /// Engine that started
        kind: EngineKind,
        /// OS process id, when the OS reported one
        pid: Option<u32>,
        /// Script the engine is running
        script: PathBuf,
    },

    /// An engine process was stopped by the router
    EngineStopped {
        /// Engine that stopped
        kind: EngineKind,
    },

    /// An engine failed to launch
    EngineFailed {
        /// Engine that failed
        kind: EngineKind,
        /// Failure description
        message: String,
    },

    /// An engine process exited on its own
    EngineExited {
        /// Engine that exited
        kind: EngineKind,
        /// Exit status description
        status: String,
    },

    // -------------------------------------------------------------------------
    // Input source events
    // -------------------------------------------------------------------------
    /// The serial source connected to a port
    SourceConnected {
        /// Port name
        port: String,
    },

    /// The serial source lost its connection
    SourceLost {
        /// Port name
        port: String,
        /// Error description
        message: String,
    },

    /// The serial source gave up reconnecting
    SourceExhausted {
        /// Attempts made before giving up
        attempts: u32,
    },

    // -------------------------------------------------------------------------
    // Control events
    // -------------------------------------------------------------------------
    /// The router shut down and all engines are stopped
    ShutdownComplete,

    /// An error occurred in the router
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl RouterEvent {
    /// Check if this event reports a failure of some kind
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            RouterEvent::SendFailed { .. }
                | RouterEvent::EngineFailed { .. }
                | RouterEvent::SourceLost { .. }
                | RouterEvent::SourceExhausted { .. }
                | RouterEvent::Error { .. }
        )
    }

    /// Check if this is an engine process lifecycle event
    pub fn is_engine_lifecycle(&self) -> bool {
        matches!(
            self,
            RouterEvent::EngineStarted { .. }
                | RouterEvent::EngineStopped { .. }
                | RouterEvent::EngineFailed { .. }
                | RouterEvent::EngineExited { .. }
        )
    }

    /// Get the engine kind if this event concerns a specific engine
    pub fn engine_kind(&self) -> Option<EngineKind> {
        match self {
            RouterEvent::MessageSent { target, .. }
            | RouterEvent::SendFailed { target, .. } => Some(*target),
            RouterEvent::EngineStarted { kind, .. }
            | RouterEvent::EngineStopped { kind }
            | RouterEvent::EngineFailed { kind, .. }
            | RouterEvent::EngineExited { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
