//! Sample types and the control id spaces of the surface
//!
//! The surface carries seven panel buttons, a 4x4 button matrix scanned by
//! the firmware, and three potentiometers. All buttons share one `u8` id
//! space: panel buttons occupy `0..=6` and matrix buttons are folded in at
//! [`MATRIX_BUTTON_BASE`].
//!
//! # Naming conventions
//!
//! Two naming schemes exist for the same ids and must not be mixed up:
//!
//! - **Wire tokens** (emitted by the firmware) are zero-based: `btn0`..`btn6`
//!   and `mbtn_0`..`mbtn_15`. Pot tokens reuse the one-based pot names
//!   (`pot1:512`).
//! - **Configuration keys** (written by humans) are one-based labels:
//!   `btn1`..`btn7`, `mbtn_1`..`mbtn_16` and `pot1`..`pot3`. `btn1` is the
//!   first panel button, id 0.
//!
//! The decoder owns the wire side; [`parse_button_key`] / [`parse_pot_key`]
//! own the configuration side; [`button_label`] / [`pot_label`] render ids
//! back into configuration labels for logs and diagnostics.

use std::fmt;

/// Number of panel buttons (`btn0`..`btn6` on the wire)
pub const PANEL_BUTTONS: u8 = 7;

/// Number of matrix buttons (`mbtn_0`..`mbtn_15` on the wire)
pub const MATRIX_BUTTONS: u8 = 16;

/// First id of the matrix bank within the shared button id space
pub const MATRIX_BUTTON_BASE: u8 = 16;

/// Number of potentiometers
pub const POT_COUNT: u8 = 3;

/// Fold a zero-based matrix button number into the shared button id space
pub const fn matrix_button(n: u8) -> u8 {
    MATRIX_BUTTON_BASE + n
}

/// ADC resolution of the microcontroller reading the pots
///
/// The hardware generation varies: older boards sample 10 bits, newer ones
/// 12. The resolution bounds raw pot readings and sets the default input
/// span for range mapping, so it is declared per deployment rather than
/// assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdcResolution {
    /// 10-bit conversion, raw readings in `0..=1023`
    #[cfg_attr(feature = "serde", serde(rename = "10-bit"))]
    TenBit,
    /// 12-bit conversion, raw readings in `0..=4095`
    #[cfg_attr(feature = "serde", serde(rename = "12-bit"))]
    TwelveBit,
}

impl AdcResolution {
    /// Largest raw reading this resolution can produce
    pub const fn max_raw(self) -> u16 {
        match self {
            AdcResolution::TenBit => 1023,
            AdcResolution::TwelveBit => 4095,
        }
    }

    /// Full input span as a float, for range mapping
    pub fn span(self) -> f32 {
        f32::from(self.max_raw())
    }
}

impl fmt::Display for AdcResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcResolution::TenBit => write!(f, "10-bit"),
            AdcResolution::TwelveBit => write!(f, "12-bit"),
        }
    }
}

/// One decoded input event from the control surface
///
/// Samples are produced fresh per decoded line and not retained. Button
/// samples carry the digital level so that held buttons, snapshot records
/// and firmware-debounced press tokens all flow through the same edge
/// detection path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sample {
    /// Digital level of a button (panel or matrix bank)
    Button {
        /// Button id in the shared id space
        id: u8,
        /// Current digital level, true = pressed
        level: bool,
    },
    /// Raw ADC reading of a potentiometer
    Pot {
        /// Pot id, `0..POT_COUNT`
        id: u8,
        /// Raw reading, bounded by the declared [`AdcResolution`]
        raw: u16,
    },
}

impl Sample {
    /// True for button samples
    pub fn is_button(&self) -> bool {
        matches!(self, Sample::Button { .. })
    }

    /// True for pot samples
    pub fn is_pot(&self) -> bool {
        matches!(self, Sample::Pot { .. })
    }
}

/// Parse a one-based configuration button key into a button id
///
/// Accepts `btn1`..`btn7` for the panel and `mbtn_1`..`mbtn_16` for the
/// matrix bank. Returns `None` for anything else.
pub fn parse_button_key(key: &str) -> Option<u8> {
    if let Some(n) = key.strip_prefix("mbtn_") {
        let n: u8 = n.parse().ok()?;
        if (1..=MATRIX_BUTTONS).contains(&n) {
            return Some(matrix_button(n - 1));
        }
        return None;
    }
    if let Some(n) = key.strip_prefix("btn") {
        let n: u8 = n.parse().ok()?;
        if (1..=PANEL_BUTTONS).contains(&n) {
            return Some(n - 1);
        }
    }
    None
}

/// Parse a one-based configuration pot key (`pot1`..`pot3`) into a pot id
pub fn parse_pot_key(key: &str) -> Option<u8> {
    let n: u8 = key.strip_prefix("pot")?.parse().ok()?;
    if (1..=POT_COUNT).contains(&n) {
        Some(n - 1)
    } else {
        None
    }
}

/// Render a button id as its configuration label
pub fn button_label(id: u8) -> String {
    if id >= MATRIX_BUTTON_BASE {
        format!("mbtn_{}", id - MATRIX_BUTTON_BASE + 1)
    } else {
        format!("btn{}", id + 1)
    }
}

/// Render a pot id as its configuration label
pub fn pot_label(id: u8) -> String {
    format!("pot{}", id + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_button_keys() {
        assert_eq!(parse_button_key("btn1"), Some(0));
        assert_eq!(parse_button_key("btn7"), Some(6));
        assert_eq!(parse_button_key("mbtn_1"), Some(MATRIX_BUTTON_BASE));
        assert_eq!(parse_button_key("mbtn_16"), Some(MATRIX_BUTTON_BASE + 15));
    }

    #[test]
    fn test_parse_button_key_rejects_out_of_range() {
        assert_eq!(parse_button_key("btn0"), None);
        assert_eq!(parse_button_key("btn8"), None);
        assert_eq!(parse_button_key("mbtn_0"), None);
        assert_eq!(parse_button_key("mbtn_17"), None);
        assert_eq!(parse_button_key("knob1"), None);
        assert_eq!(parse_button_key("btn"), None);
    }

    #[test]
    fn test_parse_pot_keys() {
        assert_eq!(parse_pot_key("pot1"), Some(0));
        assert_eq!(parse_pot_key("pot3"), Some(2));
        assert_eq!(parse_pot_key("pot0"), None);
        assert_eq!(parse_pot_key("pot4"), None);
        assert_eq!(parse_pot_key("fader1"), None);
    }

    #[test]
    fn test_labels_round_trip() {
        for id in [0u8, 3, 6, MATRIX_BUTTON_BASE, MATRIX_BUTTON_BASE + 15] {
            assert_eq!(parse_button_key(&button_label(id)), Some(id));
        }
        for id in 0..POT_COUNT {
            assert_eq!(parse_pot_key(&pot_label(id)), Some(id));
        }
    }

    #[test]
    fn test_adc_resolution_bounds() {
        assert_eq!(AdcResolution::TenBit.max_raw(), 1023);
        assert_eq!(AdcResolution::TwelveBit.max_raw(), 4095);
        assert_eq!(AdcResolution::TenBit.to_string(), "10-bit");
    }
}
