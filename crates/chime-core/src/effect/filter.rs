//! Biquad high-pass / low-pass filter
//!
//! RBJ cookbook coefficients with independent left/right state. Used in the
//! per-voice private chains (high-pass into low-pass) and as the master bus
//! sweep filter.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Cutoff range in Hz
pub const MIN_FREQUENCY: f32 = 0.0;
pub const MAX_FREQUENCY: f32 = 20_000.0;

/// Below this cutoff a high-pass is treated as a bypass; the original graph
/// parks unused high-passes at 0 Hz
const HP_BYPASS_BELOW: f32 = 10.0;

/// Filter response mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    HighPass,
}

/// Biquad filter coefficients
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    /// Identity (pass-through) coefficients
    fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    fn low_pass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 - cos_w0) / 2.0) / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: ((1.0 - cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn high_pass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Biquad filter state for both channels
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1_l: f32,
    x2_l: f32,
    y1_l: f32,
    y2_l: f32,
    x1_r: f32,
    x2_r: f32,
    y1_r: f32,
    y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: StereoSample, c: &BiquadCoeffs) -> StereoSample {
        let out_l = c.b0 * input.left + c.b1 * self.x1_l + c.b2 * self.x2_l
            - c.a1 * self.y1_l
            - c.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input.left;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = c.b0 * input.right + c.b1 * self.x1_r + c.b2 * self.x2_r
            - c.a1 * self.y1_r
            - c.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input.right;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        StereoSample::new(out_l, out_r)
    }
}

/// Stereo biquad filter stage
#[derive(Debug)]
pub struct Filter {
    mode: FilterMode,
    frequency: f32,
    q: f32,
    sample_rate: f32,
    coeffs: BiquadCoeffs,
    state: BiquadState,
    bypass: bool,
}

impl Filter {
    /// Create a filter with the given cutoff
    pub fn new(mode: FilterMode, frequency: f32, sample_rate: u32) -> Self {
        let mut filter = Self {
            mode,
            frequency: 0.0,
            q: std::f32::consts::FRAC_1_SQRT_2,
            sample_rate: sample_rate as f32,
            coeffs: BiquadCoeffs::identity(),
            state: BiquadState::default(),
            bypass: false,
        };
        filter.set_frequency(frequency);
        filter
    }

    /// Current cutoff frequency in Hz
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Set the cutoff, clamped to the documented range
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = clamped(frequency, MIN_FREQUENCY, MAX_FREQUENCY);
        let nyquist = self.sample_rate * 0.45;
        let effective = self.frequency.min(nyquist);
        match self.mode {
            FilterMode::HighPass if effective < HP_BYPASS_BELOW => {
                self.bypass = true;
                self.coeffs = BiquadCoeffs::identity();
            }
            FilterMode::HighPass => {
                self.bypass = false;
                self.coeffs = BiquadCoeffs::high_pass(effective, self.q, self.sample_rate);
            }
            FilterMode::LowPass => {
                self.bypass = false;
                self.coeffs = BiquadCoeffs::low_pass(effective.max(HP_BYPASS_BELOW), self.q, self.sample_rate);
            }
        }
    }
}

impl Stage for Filter {
    fn name(&self) -> &'static str {
        match self.mode {
            FilterMode::LowPass => "lowpass",
            FilterMode::HighPass => "highpass",
        }
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        if self.bypass {
            return;
        }
        for sample in block {
            *sample = self.state.process(*sample, &self.coeffs);
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Frequency => {
                self.set_frequency(value);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}
