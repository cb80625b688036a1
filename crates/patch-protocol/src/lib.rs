//! Control Surface Protocol Library
//!
//! This crate decodes the line protocol of a microcontroller-based control
//! surface (three pots, seven panel buttons, a 4x4 button matrix) and
//! provides the two pure input transforms the router applies to decoded
//! samples:
//!
//! - **Line decoding** ([`line`]): press tokens, pot tokens and six-field
//!   snapshot records, with a streaming codec over the raw byte stream
//! - **Range mapping** ([`map`]): linear interpolation of raw ADC readings
//!   onto per-binding output ranges
//! - **Edge detection** ([`edge`]): fire once per 0 to 1 button transition
//!
//! No I/O happens here; the crate is purely computational so the router and
//! the input simulator can share every type.
//!
//! # Example
//!
//! ```rust
//! use patch_protocol::{AdcResolution, Sample, SurfaceCodec};
//!
//! let mut codec = SurfaceCodec::new(AdcResolution::TenBit);
//! codec.push_bytes(b"pot1:512\n");
//!
//! assert_eq!(codec.next_sample(), Some(Sample::Pot { id: 0, raw: 512 }));
//! ```

pub mod edge;
pub mod error;
pub mod line;
pub mod map;
pub mod sample;

pub use edge::EdgeDetector;
pub use error::ParseError;
pub use line::{parse_line, SurfaceCodec};
pub use map::{map_range, map_range_clamped, RangeMap};
pub use sample::{
    button_label, matrix_button, parse_button_key, parse_pot_key, pot_label, AdcResolution,
    Sample, MATRIX_BUTTONS, MATRIX_BUTTON_BASE, PANEL_BUTTONS, POT_COUNT,
};
