//! Schroeder reverb
//!
//! Four parallel recirculating comb delay lines feeding two series all-pass
//! stages, per channel, with a wet/dry mix on the outside.

use super::{Stage, StageParam};
use crate::types::{clamped, StereoSample};

/// Comb delay lengths in samples at 48 kHz (mutually prime)
const COMB_TUNINGS: [usize; 4] = [1687, 1601, 2053, 2251];

/// All-pass delay lengths in samples at 48 kHz
const ALLPASS_TUNINGS: [usize; 2] = [389, 307];

const ALLPASS_GAIN: f32 = 0.5;

/// Recirculating comb delay line
#[derive(Debug)]
struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
}

impl Comb {
    fn new(len: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
            feedback,
        }
    }

    #[inline]
    fn pop(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.buffer[self.pos] = input + out * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// All-pass delay line
#[derive(Debug)]
struct AllPass {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllPass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn pop(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let fed = input + delayed * ALLPASS_GAIN;
        self.buffer[self.pos] = fed;
        self.pos = (self.pos + 1) % self.buffer.len();
        delayed - fed * ALLPASS_GAIN
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// One channel of the reverb network
#[derive(Debug)]
struct ReverbChannel {
    combs: Vec<Comb>,
    allpasses: Vec<AllPass>,
}

impl ReverbChannel {
    fn new(sample_rate: u32, decay_seconds: f32) -> Self {
        let scale = sample_rate as f32 / 48_000.0;
        let combs = COMB_TUNINGS
            .iter()
            .map(|&len| {
                let len = ((len as f32 * scale) as usize).max(8);
                // Feedback giving -60 dB after `decay_seconds` for this line length
                let loops = decay_seconds * sample_rate as f32 / len as f32;
                let feedback = 0.001f32.powf(1.0 / loops.max(1.0));
                Comb::new(len, feedback)
            })
            .collect();
        let allpasses = ALLPASS_TUNINGS
            .iter()
            .map(|&len| AllPass::new(((len as f32 * scale) as usize).max(4)))
            .collect();
        Self { combs, allpasses }
    }

    #[inline]
    fn pop(&mut self, input: f32) -> f32 {
        let combed: f32 = self.combs.iter_mut().map(|c| c.pop(input)).sum::<f32>() * 0.25;
        self.allpasses.iter_mut().fold(combed, |acc, ap| ap.pop(acc))
    }

    fn reset(&mut self) {
        self.combs.iter_mut().for_each(Comb::reset);
        self.allpasses.iter_mut().for_each(AllPass::reset);
    }
}

/// Stereo reverb stage
#[derive(Debug)]
pub struct Reverb {
    channels: [ReverbChannel; 2],
    wet: f32,
}

impl Reverb {
    /// Create a reverb with the given decay time and wet 0.5
    pub fn new(decay_seconds: f32, sample_rate: u32) -> Self {
        Self {
            channels: [
                ReverbChannel::new(sample_rate, decay_seconds),
                ReverbChannel::new(sample_rate, decay_seconds),
            ],
            wet: 0.5,
        }
    }

    pub fn wet(&self) -> f32 {
        self.wet
    }
}

impl Stage for Reverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        for sample in block {
            let wet_l = self.channels[0].pop(sample.left);
            let wet_r = self.channels[1].pop(sample.right);
            sample.left = sample.left * (1.0 - self.wet) + wet_l * self.wet;
            sample.right = sample.right * (1.0 - self.wet) + wet_r * self.wet;
        }
    }

    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        match param {
            StageParam::Wet => {
                self.wet = clamped(value, 0.0, 1.0);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.channels.iter_mut().for_each(ReverbChannel::reset);
    }
}
