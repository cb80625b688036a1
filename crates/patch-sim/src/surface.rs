//! Virtual control surface
//!
//! Mirrors the firmware's observable behavior: button presses queue the
//! same press/release pulse pair a wire press token decodes into, and pot
//! moves queue raw readings bounded by the simulated ADC. Pot positions
//! are stateful so repeated nudges walk a pot across its span the way a
//! physical knob would.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use patch_protocol::{
    matrix_button, pot_label, AdcResolution, Sample, MATRIX_BUTTONS, PANEL_BUTTONS, POT_COUNT,
};

/// Fraction of the ADC span a single nudge moves a pot
const DEFAULT_STEP_FRACTION: f32 = 0.05;

/// Configuration for creating a virtual surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualSurfaceConfig {
    /// ADC resolution to simulate
    pub resolution: AdcResolution,
    /// Fraction of the span one nudge moves a pot
    pub step_fraction: f32,
}

impl Default for VirtualSurfaceConfig {
    fn default() -> Self {
        Self {
            resolution: AdcResolution::TenBit,
            step_fraction: DEFAULT_STEP_FRACTION,
        }
    }
}

/// A simulated control surface that queues decoder-identical samples
///
/// All ids use the same zero-based spaces as [`Sample`]: panel buttons
/// `0..=6`, matrix buttons folded in at the matrix base, pots `0..=2`.
#[derive(Debug)]
pub struct VirtualSurface {
    resolution: AdcResolution,
    step: u16,
    pots: [u16; POT_COUNT as usize],
    pending: VecDeque<Sample>,
}

impl VirtualSurface {
    /// Create a surface with the default nudge step
    pub fn new(resolution: AdcResolution) -> Self {
        Self::from_config(VirtualSurfaceConfig {
            resolution,
            ..Default::default()
        })
    }

    /// Create a surface from configuration
    pub fn from_config(config: VirtualSurfaceConfig) -> Self {
        let step = (config.resolution.span() * config.step_fraction).round() as u16;
        Self {
            resolution: config.resolution,
            step: step.max(1),
            pots: [0; POT_COUNT as usize],
            pending: VecDeque::new(),
        }
    }

    /// ADC resolution this surface simulates
    pub fn resolution(&self) -> AdcResolution {
        self.resolution
    }

    /// Current raw value of a pot
    pub fn pot(&self, id: u8) -> Option<u16> {
        self.pots.get(id as usize).copied()
    }

    /// Press a panel button (zero-based wire number)
    ///
    /// Returns false for an out-of-range button.
    pub fn press_button(&mut self, n: u8) -> bool {
        if n >= PANEL_BUTTONS {
            warn!("no such panel button: {}", n);
            return false;
        }
        self.queue_pulse(n);
        true
    }

    /// Press a matrix button (zero-based wire number)
    pub fn press_matrix(&mut self, n: u8) -> bool {
        if n >= MATRIX_BUTTONS {
            warn!("no such matrix button: {}", n);
            return false;
        }
        self.queue_pulse(matrix_button(n));
        true
    }

    /// Set a pot to an absolute raw value, clamped to the ADC span
    ///
    /// Queues a reading only when the value actually changes.
    pub fn set_pot(&mut self, id: u8, raw: u16) -> bool {
        let raw = raw.min(self.resolution.max_raw());
        let Some(slot) = self.pots.get_mut(id as usize) else {
            warn!("no such pot: {}", id);
            return false;
        };
        if *slot != raw {
            *slot = raw;
            self.pending.push_back(Sample::Pot { id, raw });
        }
        true
    }

    /// Nudge a pot one step up or down, pinned at the rails
    pub fn nudge_pot(&mut self, id: u8, up: bool) -> bool {
        let Some(current) = self.pot(id) else {
            warn!("no such pot: {}", id);
            return false;
        };
        let raw = if up {
            current.saturating_add(self.step)
        } else {
            current.saturating_sub(self.step)
        };
        self.set_pot(id, raw)
    }

    /// Take the next queued sample
    pub fn take_sample(&mut self) -> Option<Sample> {
        self.pending.pop_front()
    }

    /// Check if samples are queued
    pub fn has_samples(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of queued samples
    pub fn sample_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop all queued samples
    pub fn clear_samples(&mut self) {
        self.pending.clear();
    }

    /// One-line summary of the pot positions
    pub fn state_summary(&self) -> String {
        self.pots
            .iter()
            .enumerate()
            .map(|(id, raw)| format!("{}={}", pot_label(id as u8), raw))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn queue_pulse(&mut self, id: u8) {
        self.pending.push_back(Sample::Button { id, level: true });
        self.pending.push_back(Sample::Button { id, level: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patch_protocol::MATRIX_BUTTON_BASE;

    #[test]
    fn test_press_queues_pulse_pair() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);

        assert!(surface.press_button(3));
        assert_eq!(surface.sample_count(), 2);
        assert_eq!(
            surface.take_sample(),
            Some(Sample::Button { id: 3, level: true })
        );
        assert_eq!(
            surface.take_sample(),
            Some(Sample::Button {
                id: 3,
                level: false
            })
        );
        assert!(!surface.has_samples());
    }

    #[test]
    fn test_matrix_press_folds_into_shared_space() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);

        assert!(surface.press_matrix(15));
        assert_eq!(
            surface.take_sample(),
            Some(Sample::Button {
                id: MATRIX_BUTTON_BASE + 15,
                level: true
            })
        );
    }

    #[test]
    fn test_out_of_range_controls_rejected() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);

        assert!(!surface.press_button(7));
        assert!(!surface.press_matrix(16));
        assert!(!surface.set_pot(3, 0));
        assert!(!surface.nudge_pot(3, true));
        assert!(!surface.has_samples());
    }

    #[test]
    fn test_set_pot_clamps_to_span() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);

        assert!(surface.set_pot(0, 9999));
        assert_eq!(surface.pot(0), Some(1023));
        assert_eq!(
            surface.take_sample(),
            Some(Sample::Pot { id: 0, raw: 1023 })
        );
    }

    #[test]
    fn test_no_sample_when_value_unchanged() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);

        surface.set_pot(1, 512);
        surface.set_pot(1, 512);

        assert_eq!(surface.sample_count(), 1);
    }

    #[test]
    fn test_nudge_walks_and_pins_at_the_rails() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);

        // already at the low rail, nothing to report
        assert!(surface.nudge_pot(0, false));
        assert!(!surface.has_samples());

        // 5% of the 10-bit span per step
        assert!(surface.nudge_pot(0, true));
        assert_eq!(surface.pot(0), Some(51));

        for _ in 0..50 {
            surface.nudge_pot(0, true);
        }
        assert_eq!(surface.pot(0), Some(1023));
    }

    #[test]
    fn test_from_config_custom_step() {
        let surface = VirtualSurface::from_config(VirtualSurfaceConfig {
            resolution: AdcResolution::TwelveBit,
            step_fraction: 0.25,
        });

        assert_eq!(surface.resolution(), AdcResolution::TwelveBit);

        let mut surface = surface;
        surface.nudge_pot(2, true);
        assert_eq!(surface.pot(2), Some(1024));
    }

    #[test]
    fn test_state_summary_lists_config_labels() {
        let mut surface = VirtualSurface::new(AdcResolution::TenBit);
        surface.set_pot(0, 100);

        assert_eq!(surface.state_summary(), "pot1=100 pot2=0 pot3=0");
    }
}
