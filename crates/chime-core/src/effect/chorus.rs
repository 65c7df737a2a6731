//! Chorus
//!
//! LFO-modulated short delay mixed with the dry signal. The left and right
//! LFOs run in quadrature for stereo width.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Center delay of the modulated line (seconds)
const BASE_DELAY_SECS: f32 = 0.020;

/// Maximum excursion around the center at depth 1.0 (seconds)
const MOD_RANGE_SECS: f32 = 0.008;

/// LFO rate in Hz
const LFO_RATE: f32 = 1.5;

/// Chorus stage
#[derive(Debug)]
pub struct Chorus {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    phase: f32,
    phase_inc: f32,
    base_samples: f32,
    range_samples: f32,
    depth: f32,
    wet: f32,
}

impl Chorus {
    pub fn new(sample_rate: u32) -> Self {
        let max = ((BASE_DELAY_SECS + MOD_RANGE_SECS) * sample_rate as f32) as usize + 4;
        Self {
            buffer_l: vec![0.0; max],
            buffer_r: vec![0.0; max],
            write_pos: 0,
            phase: 0.0,
            phase_inc: LFO_RATE / sample_rate as f32,
            base_samples: BASE_DELAY_SECS * sample_rate as f32,
            range_samples: MOD_RANGE_SECS * sample_rate as f32,
            depth: 0.5,
            wet: 0.5,
        }
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Linear-interpolated read `delay` samples behind the write head
    #[inline]
    fn read(buffer: &[f32], write_pos: usize, delay: f32) -> f32 {
        let len = buffer.len() as f32;
        let pos = (write_pos as f32 - delay + len) % len;
        let i0 = pos as usize;
        let i1 = (i0 + 1) % buffer.len();
        let frac = pos - i0 as f32;
        buffer[i0] * (1.0 - frac) + buffer[i1] * frac
    }
}

impl Stage for Chorus {
    fn name(&self) -> &'static str {
        "chorus"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block {
            let lfo_l = (self.phase * std::f32::consts::TAU).sin();
            let lfo_r = (self.phase * std::f32::consts::TAU).cos();
            self.phase = (self.phase + self.phase_inc).fract();

            let delay_l = self.base_samples + lfo_l * self.depth * self.range_samples;
            let delay_r = self.base_samples + lfo_r * self.depth * self.range_samples;

            self.buffer_l[self.write_pos] = sample.left;
            self.buffer_r[self.write_pos] = sample.right;

            let wet_l = Self::read(&self.buffer_l, self.write_pos, delay_l);
            let wet_r = Self::read(&self.buffer_r, self.write_pos, delay_r);
            self.write_pos = (self.write_pos + 1) % self.buffer_l.len();

            sample.left = sample.left * (1.0 - self.wet) + wet_l * self.wet;
            sample.right = sample.right * (1.0 - self.wet) + wet_r * self.wet;
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Depth => {
                self.depth = clamped(value, 0.0, 1.0);
                true
            }
            StageParam::Wet => {
                self.wet = clamped(value, 0.0, 1.0);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    #[test]
    fn test_depth_clamped() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        assert!(chorus.try_set(StageParam::Depth, 9.0));
        assert_eq!(chorus.depth(), 1.0);
        assert!(chorus.try_set(StageParam::Depth, -2.0));
        assert_eq!(chorus.depth(), 0.0);
    }

    #[test]
    fn test_output_is_bounded() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.try_set(StageParam::Depth, 1.0);
        let mut block: Vec<StereoSample> = (0..4096)
            .map(|i| {
                let v = (i as f32 * 0.05).sin() * 0.8;
                StereoSample::new(v, v)
            })
            .collect();
        chorus.process(&mut block);
        for sample in &block {
            assert!(sample.left.abs() <= 1.0 && sample.right.abs() <= 1.0);
        }
    }
}
