//! Error types for control-surface line parsing

use thiserror::Error;

/// Errors that can occur while parsing a line from the control surface
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line matched none of the recognized shapes
    #[error("unrecognized line: {0:?}")]
    UnrecognizedLine(String),

    /// Token referenced a control that does not exist on the surface
    #[error("unknown control: {0:?}")]
    UnknownControl(String),

    /// A pot field was not a non-negative integer
    #[error("invalid pot value: {0:?}")]
    InvalidPotValue(String),

    /// A pot reading exceeded the declared ADC span
    #[error("pot value {raw} out of range (max {max})")]
    PotOutOfRange { raw: u16, max: u16 },

    /// A button field in a snapshot record was not 0 or 1
    #[error("invalid button flag: {0:?}")]
    InvalidButtonFlag(String),

    /// A snapshot record did not carry exactly six fields
    #[error("expected 6 record fields, got {0}")]
    WrongFieldCount(usize),
}
