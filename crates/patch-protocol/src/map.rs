//! Linear range mapping for pot readings
//!
//! Raw ADC readings are mapped onto the output range a binding declares
//! (filter cutoffs in Hz, normalized 0..1 amounts, integer step counts).
//! The mapping is a plain linear interpolation with no clamping: input
//! outside the declared range extrapolates. That is deliberate and relied
//! on by tests; callers that want saturation use [`map_range_clamped`].
//!
//! A zero-width input range would divide by zero. That is a configuration
//! mistake and is rejected when the configuration is compiled, not checked
//! per sample.

/// Map `value` linearly from `[in_min, in_max]` onto `[out_min, out_max]`
///
/// Caller guarantees `in_min != in_max`. Out-of-range input extrapolates.
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min)
}

/// [`map_range`] with the input clamped into `[in_min, in_max]` first
pub fn map_range_clamped(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    map_range(value.clamp(in_min, in_max), in_min, in_max, out_min, out_max)
}

/// A validated input/output range pair for one pot binding
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeMap {
    /// Lower input bound (raw reading)
    pub in_min: f32,
    /// Upper input bound (raw reading)
    pub in_max: f32,
    /// Output at `in_min`
    pub out_min: f32,
    /// Output at `in_max`
    pub out_max: f32,
}

impl RangeMap {
    /// Full-span input, unit output; the default for bindings without a range
    pub fn unit(in_max: f32) -> Self {
        Self {
            in_min: 0.0,
            in_max,
            out_min: 0.0,
            out_max: 1.0,
        }
    }

    /// True when the input range cannot be mapped (division by zero)
    pub fn is_degenerate(&self) -> bool {
        self.in_min == self.in_max
    }

    /// Map a raw reading through this range
    pub fn map(&self, value: f32) -> f32 {
        map_range(value, self.in_min, self.in_max, self.out_min, self.out_max)
    }

    /// Map with the input clamped to the declared bounds
    pub fn map_clamped(&self, value: f32) -> f32 {
        map_range_clamped(value, self.in_min, self.in_max, self.out_min, self.out_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_of_ten_bit_span() {
        let mapped = map_range(512.0, 0.0, 1023.0, 0.0, 100.0);
        assert!((mapped - 50.05).abs() < 0.01, "got {mapped}");
    }

    #[test]
    fn test_endpoints_are_exact() {
        assert_eq!(map_range(0.0, 0.0, 1023.0, 0.0, 100.0), 0.0);
        assert_eq!(map_range(1023.0, 0.0, 1023.0, 0.0, 100.0), 100.0);
    }

    #[test]
    fn test_out_of_range_input_extrapolates() {
        assert_eq!(map_range(2046.0, 0.0, 1023.0, 0.0, 100.0), 200.0);
        assert_eq!(map_range(-1023.0, 0.0, 1023.0, 0.0, 100.0), -100.0);
    }

    #[test]
    fn test_clamped_variant_saturates() {
        assert_eq!(map_range_clamped(2046.0, 0.0, 1023.0, 0.0, 100.0), 100.0);
        assert_eq!(map_range_clamped(-50.0, 0.0, 1023.0, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_inverted_output_range() {
        // Pots are often wired backwards; the output range flips instead
        assert_eq!(map_range(0.0, 0.0, 1023.0, 100.0, 0.0), 100.0);
        assert_eq!(map_range(1023.0, 0.0, 1023.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn test_degenerate_detection() {
        assert!(RangeMap {
            in_min: 5.0,
            in_max: 5.0,
            out_min: 0.0,
            out_max: 1.0
        }
        .is_degenerate());
        assert!(!RangeMap::unit(1023.0).is_degenerate());
    }

    #[test]
    fn test_unit_default() {
        let r = RangeMap::unit(4095.0);
        assert_eq!(r.map(0.0), 0.0);
        assert_eq!(r.map(4095.0), 1.0);
    }
}
