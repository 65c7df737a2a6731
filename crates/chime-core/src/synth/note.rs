//! Single-tone note voice

use super::{
    Envelope, Oscillator, Resettable, SynthPreset, Voice, VoiceTrigger, BASELINE_FREQUENCY,
    BASELINE_LEVEL,
};
use crate::types::VoiceType;

/// One oscillator through an ADSR envelope
#[derive(Debug)]
pub struct NoteVoice {
    osc: Oscillator,
    env: Envelope,
    level: f32,
    velocity: f32,
    /// Samples until the envelope auto-releases
    release_in: Option<usize>,
    sample_rate: u32,
}

impl NoteVoice {
    pub fn new(preset: SynthPreset, sample_rate: u32) -> Self {
        let (waveform, attack, decay, sustain, release) = preset.adsr();
        Self {
            osc: Oscillator::new(waveform, BASELINE_FREQUENCY, sample_rate),
            env: Envelope::new(attack, decay, sustain, release, sample_rate),
            level: BASELINE_LEVEL,
            velocity: 1.0,
            release_in: None,
            sample_rate,
        }
    }
}

impl Resettable for NoteVoice {
    fn reset(&mut self) {
        self.env.stop();
        self.osc.set_frequency(BASELINE_FREQUENCY);
        self.osc.reset_phase();
        self.level = BASELINE_LEVEL;
        self.velocity = 1.0;
        self.release_in = None;
    }
}

impl Voice for NoteVoice {
    fn voice_type(&self) -> VoiceType {
        VoiceType::Note
    }

    fn trigger(&mut self, trigger: &VoiceTrigger) {
        if let Some(&freq) = trigger.freqs.first() {
            self.osc.set_frequency(freq);
        }
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
            *sample = self.osc.next() * self.env.next() * self.level * self.velocity;
        }
    }

    fn is_quiet(&self) -> bool {
        self.env.is_idle()
    }

    fn frequency(&self) -> f32 {
        self.osc.frequency()
    }
}
