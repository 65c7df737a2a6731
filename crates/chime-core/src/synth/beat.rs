//! Membrane-style beat voice
//!
//! A kick-drum model: a sine whose pitch sweeps down exponentially from a
//! few octaves above the fundamental while a fast ADSR shapes the amplitude.

use super::{
    Envelope, Oscillator, Resettable, Voice, VoiceTrigger, Waveform, BASELINE_FREQUENCY,
    BASELINE_LEVEL, BEAT_ATTACK, BEAT_DECAY, BEAT_PITCH_DECAY, BEAT_RELEASE, BEAT_SUSTAIN,
};
use crate::types::VoiceType;

/// Pitch starts this many times above the fundamental
const PITCH_SWEEP_RATIO: f32 = 4.0;

/// Kick voice
#[derive(Debug)]
pub struct BeatVoice {
    osc: Oscillator,
    env: Envelope,
    base_freq: f32,
    /// Remaining pitch-sweep multiplier above 1.0; decays toward 0
    sweep: f32,
    sweep_decay: f32,
    level: f32,
    velocity: f32,
    release_in: Option<usize>,
    sample_rate: u32,
}

impl BeatVoice {
    pub fn new(sample_rate: u32) -> Self {
        // Per-sample decay factor for the pitch sweep time constant
        let sweep_decay = (-1.0 / (BEAT_PITCH_DECAY * sample_rate as f32)).exp();
        Self {
            osc: Oscillator::new(Waveform::Sine, BASELINE_FREQUENCY, sample_rate),
            env: Envelope::new(BEAT_ATTACK, BEAT_DECAY, BEAT_SUSTAIN, BEAT_RELEASE, sample_rate),
            base_freq: BASELINE_FREQUENCY,
            sweep: 0.0,
            sweep_decay,
            level: BASELINE_LEVEL,
            velocity: 1.0,
            release_in: None,
            sample_rate,
        }
    }
}

impl Resettable for BeatVoice {
    fn reset(&mut self) {
        self.env.stop();
        self.base_freq = BASELINE_FREQUENCY;
        self.osc.set_frequency(BASELINE_FREQUENCY);
        self.osc.reset_phase();
        self.sweep = 0.0;
        self.level = BASELINE_LEVEL;
        self.velocity = 1.0;
        self.release_in = None;
    }
}

impl Voice for BeatVoice {
    fn voice_type(&self) -> VoiceType {
        VoiceType::Beat
    }

    fn trigger(&mut self, trigger: &VoiceTrigger) {
        if let Some(&freq) = trigger.freqs.first() {
            self.base_freq = freq;
        }
        self.sweep = PITCH_SWEEP_RATIO - 1.0;
        self.velocity = trigger.velocity.clamp(0.0, 1.0);
        self.release_in = if trigger.duration_secs > 0.0 {
            Some((trigger.duration_secs * self.sample_rate as f32) as usize)
        } else {
            None
        };
        self.env.trigger();
    }

    fn release(&mut self) {
        self.release_in = None;
        self.env.release();
    }

    fn render(&mut self, out: &mut [f32]) {
        for sample in out {
            if let Some(remaining) = &mut self.release_in {
                if *remaining == 0 {
                    self.release_in = None;
                    self.env.release();
                } else {
                    *remaining -= 1;
                }
            }
            self.osc.set_frequency(self.base_freq * (1.0 + self.sweep));
            self.sweep *= self.sweep_decay;
            *sample = self.osc.next() * self.env.next() * self.level * self.velocity;
        }
    }

    fn is_quiet(&self) -> bool {
        self.env.is_idle()
    }

    fn frequency(&self) -> f32 {
        self.base_freq
    }
}
