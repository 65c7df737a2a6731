//! Bitcrusher
//!
//! Quantizes samples to a reduced bit depth. The quantization scale is
//! cached so the per-sample path is a couple of multiplies.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Valid bit-depth range
pub const MIN_BITS: f32 = 1.0;
pub const MAX_BITS: f32 = 16.0;

/// Bit-depth reduction stage
#[derive(Debug)]
pub struct Bitcrusher {
    bits: f32,
    /// Cached 2^bits
    scale: f32,
    wet: f32,
}

impl Bitcrusher {
    pub fn new(bits: f32) -> Self {
        let mut crusher = Self {
            bits: 0.0,
            scale: 0.0,
            wet: 0.3,
        };
        crusher.set_bits(bits);
        crusher
    }

    pub fn bits(&self) -> f32 {
        self.bits
    }

    pub fn set_bits(&mut self, bits: f32) {
        self.bits = clamped(bits, MIN_BITS, MAX_BITS);
        self.scale = 2f32.powf(self.bits);
    }

    #[inline]
    fn crush(&self, sample: f32) -> f32 {
        (sample * self.scale).round() / self.scale
    }
}

impl Stage for Bitcrusher {
    fn name(&self) -> &'static str {
        "bitcrusher"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block {
            let wet_l = self.crush(sample.left);
            let wet_r = self.crush(sample.right);
            sample.left = sample.left * (1.0 - self.wet) + wet_l * self.wet;
            sample.right = sample.right * (1.0 - self.wet) + wet_r * self.wet;
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Bits => {
                self.set_bits(value);
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
    fn test_quantization_grid() {
        let crusher = Bitcrusher::new(2.0); // scale 4: grid of 0.25
        assert!((crusher.crush(0.3) - 0.25).abs() < 1e-6);
        assert!((crusher.crush(-0.3) + 0.25).abs() < 1e-6);
        assert_eq!(crusher.crush(0.0), 0.0);
    }

    #[test]
    fn test_no_bias() {
        let crusher = Bitcrusher::new(4.0);
        let v = 0.3777;
        assert!((crusher.crush(v) + crusher.crush(-v)).abs() < 1e-6);
    }

    #[test]
    fn test_bits_clamped() {
        let mut crusher = Bitcrusher::new(8.0);
        assert!(crusher.try_set(StageParam::Bits, 0.0));
        assert_eq!(crusher.bits(), MIN_BITS);
        assert!(crusher.try_set(StageParam::Bits, 99.0));
        assert_eq!(crusher.bits(), MAX_BITS);
    }
}
