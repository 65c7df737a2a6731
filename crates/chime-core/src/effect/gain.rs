//! Gain stage
//!
//! Linear gain with a perceptual dB mapping for the master volume control.
//! Also serves as the unity passthrough the master bus degrades to when a
//! stage fails to construct.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Volume slider floor in dB (slider 0.0 maps here, 1.0 maps to 0 dB)
const VOLUME_FLOOR_DB: f32 = -100.0;

/// Linear gain stage
#[derive(Debug)]
pub struct Gain {
    gain: f32,
}

impl Gain {
    /// Unity gain
    pub fn unity() -> Self {
        Self { gain: 1.0 }
    }

    /// Gain from a 0..1 volume slider using the perceptual dB curve
    pub fn from_volume(volume: f32) -> Self {
        let mut gain = Self::unity();
        gain.set_volume(volume);
        gain
    }

    /// Current linear gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set a 0..1 volume, mapped to -100..0 dB then to linear gain.
    /// A slider at exactly 0 is full mute, not -100 dB.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = clamped(volume, 0.0, 1.0);
        if volume == 0.0 {
            self.gain = 0.0;
        } else {
            let db = VOLUME_FLOOR_DB * (1.0 - volume);
            self.gain = 10f32.powf(db / 20.0);
        }
    }
}

impl Stage for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        if (self.gain - 1.0).abs() < f32::EPSILON {
            return;
        }
        for sample in block {
            sample.left *= self.gain;
            sample.right *= self.gain;
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Level => {
                self.set_volume(value);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_curve_endpoints() {
        let mut gain = Gain::unity();
        gain.set_volume(1.0);
        assert!((gain.gain() - 1.0).abs() < 1e-6);
        gain.set_volume(0.0);
        assert_eq!(gain.gain(), 0.0);
        // Halfway is -50 dB
        gain.set_volume(0.5);
        assert!((gain.gain() - 10f32.powf(-50.0 / 20.0)).abs() < 1e-6);
    }

    #[test]
    fn test_volume_clamped() {
        let mut gain = Gain::unity();
        assert!(gain.try_set(StageParam::Level, 4.0));
        assert!((gain.gain() - 1.0).abs() < 1e-6);
        assert!(gain.try_set(StageParam::Level, -1.0));
        assert_eq!(gain.gain(), 0.0);
    }

    #[test]
    fn test_unity_passthrough() {
        let mut gain = Gain::unity();
        let mut block = vec![StereoSample::new(0.3, -0.3); 16];
        gain.process(&mut block);
        assert_eq!(block[0], StereoSample::new(0.3, -0.3));
    }
}
