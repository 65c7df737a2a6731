//! Spatial panner
//!
//! Places a voice in the scene: equal-power azimuth panning plus
//! inverse-distance attenuation (reference distance 1, maximum distance 50,
//! rolloff 1 — the listener sits at the origin facing -z).

use super::Stage;
use crate::types::StereoSample;

const REF_DISTANCE: f32 = 1.0;
const MAX_DISTANCE: f32 = 50.0;
const ROLLOFF: f32 = 1.0;

/// Mono-to-stereo spatializer stage
///
/// Expects dual-mono input (both channels identical, as produced by the
/// voice chain) and applies per-channel gains derived from the position.
#[derive(Debug)]
pub struct SpatialPanner {
    position: (f32, f32, f32),
    gain_l: f32,
    gain_r: f32,
}

impl SpatialPanner {
    /// Panner at the listener origin (centered, no attenuation)
    pub fn new() -> Self {
        let mut panner = Self {
            position: (0.0, 0.0, 0.0),
            gain_l: std::f32::consts::FRAC_1_SQRT_2,
            gain_r: std::f32::consts::FRAC_1_SQRT_2,
        };
        panner.set_position(0.0, 0.0, 0.0);
        panner
    }

    /// Current position
    pub fn position(&self) -> (f32, f32, f32) {
        self.position
    }

    /// Move the source and recompute channel gains
    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = (x, y, z);

        let distance = (x * x + y * y + z * z).sqrt().clamp(REF_DISTANCE, MAX_DISTANCE);
        let attenuation = REF_DISTANCE / (REF_DISTANCE + ROLLOFF * (distance - REF_DISTANCE));

        // Pan position from the horizontal angle; straight ahead is centered
        let horizontal = (x * x + z * z).sqrt();
        let pan = if horizontal > 1e-6 { x / horizontal } else { 0.0 };
        let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
        self.gain_l = angle.cos() * attenuation;
        self.gain_r = angle.sin() * attenuation;
    }

    /// Current channel gains (left, right)
    pub fn gains(&self) -> (f32, f32) {
        (self.gain_l, self.gain_r)
    }
}

impl Default for SpatialPanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for SpatialPanner {
    fn name(&self) -> &'static str {
        "panner"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block {
            sample.left *= self.gain_l;
            sample.right *= self.gain_r;
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_is_equal_power() {
        let panner = SpatialPanner::new();
        let (l, r) = panner.gains();
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hard_left_and_right() {
        let mut panner = SpatialPanner::new();
        panner.set_position(-1.0, 0.0, 0.0);
        let (l, r) = panner.gains();
        assert!(l > 0.9 && r.abs() < 1e-5, "left: {l}, right: {r}");

        panner.set_position(1.0, 0.0, 0.0);
        let (l, r) = panner.gains();
        assert!(r > 0.9 && l.abs() < 1e-5, "left: {l}, right: {r}");
    }

    #[test]
    fn test_distance_attenuates() {
        let mut near = SpatialPanner::new();
        near.set_position(0.0, 0.0, -1.0);
        let mut far = SpatialPanner::new();
        far.set_position(0.0, 0.0, -20.0);
        assert!(far.gains().0 < near.gains().0 * 0.2);
    }

    #[test]
    fn test_distance_clamped_at_max() {
        let mut at_max = SpatialPanner::new();
        at_max.set_position(0.0, 0.0, -MAX_DISTANCE);
        let mut beyond = SpatialPanner::new();
        beyond.set_position(0.0, 0.0, -MAX_DISTANCE * 10.0);
        assert!((at_max.gains().0 - beyond.gains().0).abs() < 1e-6);
    }
}
