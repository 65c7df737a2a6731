//! Soft-clipping distortion
//!
//! tanh waveshaper with a drive control. Output is normalized by the shaped
//! drive ceiling so increasing drive changes color, not loudness.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Drive 0..1 maps to a pre-gain of 1..MAX_PREGAIN
const MAX_PREGAIN: f32 = 10.0;

/// Waveshaper stage
#[derive(Debug)]
pub struct Distortion {
    drive: f32,
    pregain: f32,
    norm: f32,
    wet: f32,
}

impl Distortion {
    pub fn new(drive: f32) -> Self {
        let mut distortion = Self {
            drive: 0.0,
            pregain: 1.0,
            norm: 1.0,
            wet: 0.4,
        };
        distortion.set_drive(drive);
        distortion
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    pub fn set_drive(&mut self, drive: f32) {
        self.drive = clamped(drive, 0.0, 1.0);
        self.pregain = 1.0 + self.drive * (MAX_PREGAIN - 1.0);
        self.norm = 1.0 / self.pregain.tanh();
    }

    #[inline]
    fn shape(&self, sample: f32) -> f32 {
        (sample * self.pregain).tanh() * self.norm
    }
}

impl Stage for Distortion {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block {
            let wet_l = self.shape(sample.left);
            let wet_r = self.shape(sample.right);
            sample.left = sample.left * (1.0 - self.wet) + wet_l * self.wet;
            sample.right = sample.right * (1.0 - self.wet) + wet_r * self.wet;
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Drive => {
                self.set_drive(value);
                true
            }
            StageParam::Wet => {
                self.wet = clamped(value, 0.0, 1.0);
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
    fn test_shape_is_odd_and_bounded() {
        let distortion = Distortion::new(0.8);
        for &v in &[0.1f32, 0.5, 0.9, 2.0] {
            let out = distortion.shape(v);
            assert!(out.abs() <= 1.0 + 1e-6);
            assert!((distortion.shape(-v) + out).abs() < 1e-6);
        }
    }

    #[test]
    fn test_drive_clamped() {
        let mut distortion = Distortion::new(0.5);
        assert!(distortion.try_set(StageParam::Drive, 7.0));
        assert_eq!(distortion.drive(), 1.0);
        assert!(!distortion.try_set(StageParam::Frequency, 100.0));
    }
}
