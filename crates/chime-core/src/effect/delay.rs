//! Stereo feedback delay
//!
//! Ring-buffer delay line with feedback and wet/dry mix. Used both as a
//! per-voice chain stage (wet set by the object's effect params) and as a
//! master bus stage.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Maximum delay time in seconds
const MAX_DELAY_SECONDS: f32 = 2.0;

/// Feedback is capped short of unity so the tail always decays
pub const MAX_FEEDBACK: f32 = 0.95;

/// Stereo delay line
#[derive(Debug)]
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(max_samples: usize, delay_samples: usize) -> Self {
        Self {
            buffer_l: vec![0.0; max_samples],
            buffer_r: vec![0.0; max_samples],
            write_pos: 0,
            delay_samples: delay_samples.min(max_samples - 1),
        }
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.buffer_l.len() - 1);
    }

    #[inline]
    fn read(&self) -> (f32, f32) {
        let len = self.buffer_l.len();
        let read_pos = (self.write_pos + len - self.delay_samples) % len;
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    #[inline]
    fn write(&mut self, left: f32, right: f32) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        self.write_pos = (self.write_pos + 1) % self.buffer_l.len();
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Feedback delay stage
#[derive(Debug)]
pub struct Delay {
    line: DelayLine,
    sample_rate: f32,
    feedback: f32,
    wet: f32,
}

impl Delay {
    /// Create a delay with the given time, feedback 0.5 and wet 0.5
    pub fn new(delay_seconds: f32, sample_rate: u32) -> Self {
        let max_samples = (sample_rate as f32 * MAX_DELAY_SECONDS) as usize;
        let delay_samples = (sample_rate as f32 * delay_seconds) as usize;
        Self {
            line: DelayLine::new(max_samples.max(2), delay_samples.max(1)),
            sample_rate: sample_rate as f32,
            feedback: 0.5,
            wet: 0.5,
        }
    }

    /// Set the delay time in seconds (clamped to the buffer size)
    pub fn set_delay_seconds(&mut self, seconds: f32) {
        let samples = (self.sample_rate * seconds.max(0.0)) as usize;
        self.line.set_delay_samples(samples.max(1));
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }
}

impl Stage for Delay {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block {
            let (delayed_l, delayed_r) = self.line.read();
            self.line.write(
                sample.left + delayed_l * self.feedback,
                sample.right + delayed_r * self.feedback,
            );
            sample.left = sample.left * (1.0 - self.wet) + delayed_l * self.wet;
            sample.right = sample.right * (1.0 - self.wet) + delayed_r * self.wet;
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Wet => {
                self.wet = clamped(value, 0.0, 1.0);
                true
            }
            StageParam::Feedback => {
                self.feedback = clamped(value, 0.0, MAX_FEEDBACK);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    #[test]
    fn test_impulse_reappears_after_delay_time() {
        let mut delay = Delay::new(0.01, SAMPLE_RATE); // 480 samples
        delay.try_set(StageParam::Wet, 1.0);
        delay.try_set(StageParam::Feedback, 0.0);

        let mut block = vec![StereoSample::zero(); 1024];
        block[0] = StereoSample::new(1.0, 1.0);
        delay.process(&mut block);

        let delay_samples = (SAMPLE_RATE as f32 * 0.01) as usize;
        assert_eq!(block[0], StereoSample::zero());
        assert!((block[delay_samples].left - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_clamped_below_unity() {
        let mut delay = Delay::new(0.1, SAMPLE_RATE);
        assert!(delay.try_set(StageParam::Feedback, 3.0));
        assert!((delay.feedback() - MAX_FEEDBACK).abs() < 1e-6);
        assert!(delay.try_set(StageParam::Wet, -1.0));
        assert_eq!(delay.wet(), 0.0);
    }

    #[test]
    fn test_dry_when_wet_zero() {
        let mut delay = Delay::new(0.05, SAMPLE_RATE);
        delay.try_set(StageParam::Wet, 0.0);
        let mut block = vec![StereoSample::new(0.5, -0.5); 64];
        delay.process(&mut block);
        for sample in &block {
            assert!((sample.left - 0.5).abs() < 1e-6);
        }
    }
}
