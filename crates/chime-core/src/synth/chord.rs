//! Triad chord voice

use super::{
    Envelope, Oscillator, Resettable, SynthPreset, Voice, VoiceTrigger, BASELINE_FREQUENCY,
    BASELINE_LEVEL,
};
use crate::types::VoiceType;

/// Voices in the chord
const POLYPHONY: usize = 3;

/// Major-triad ratios used when a trigger supplies fewer than three notes
const TRIAD_RATIOS: [f32; POLYPHONY] = [1.0, 1.25, 1.5];

/// Three oscillators under a shared envelope
#[derive(Debug)]
pub struct ChordVoice {
    oscs: [Oscillator; POLYPHONY],
    env: Envelope,
    level: f32,
    velocity: f32,
    release_in: Option<usize>,
    sample_rate: u32,
}

impl ChordVoice {
    pub fn new(preset: SynthPreset, sample_rate: u32) -> Self {
        let (waveform, attack, decay, sustain, release) = preset.adsr();
        Self {
            oscs: std::array::from_fn(|i| {
                Oscillator::new(waveform, BASELINE_FREQUENCY * TRIAD_RATIOS[i], sample_rate)
            }),
            env: Envelope::new(attack, decay, sustain, release, sample_rate),
            level: BASELINE_LEVEL,
            velocity: 1.0,
            release_in: None,
            sample_rate,
        }
    }
}

impl Resettable for ChordVoice {
    fn reset(&mut self) {
        self.env.stop();
        for (osc, ratio) in self.oscs.iter_mut().zip(TRIAD_RATIOS) {
            osc.set_frequency(BASELINE_FREQUENCY * ratio);
            osc.reset_phase();
        }
        self.level = BASELINE_LEVEL;
        self.velocity = 1.0;
        self.release_in = None;
    }
}

impl Voice for ChordVoice {
    fn voice_type(&self) -> VoiceType {
        VoiceType::Chord
    }

    fn trigger(&mut self, trigger: &VoiceTrigger) {
        let root = trigger.freqs.first().copied().unwrap_or(BASELINE_FREQUENCY);
        for (i, osc) in self.oscs.iter_mut().enumerate() {
            let freq = trigger
                .freqs
                .get(i)
                .copied()
                .unwrap_or(root * TRIAD_RATIOS[i]);
            osc.set_frequency(freq);
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
        let scale = self.level * self.velocity / POLYPHONY as f32;
        for sample in out {
            if let Some(remaining) = &mut self.release_in {
                if *remaining == 0 {
                    self.release_in = None;
                    self.env.release();
                } else {
                    *remaining -= 1;
                }
            }
            let sum: f32 = self.oscs.iter_mut().map(Oscillator::next).sum();
            *sample = sum * self.env.next() * scale;
        }
    }

    fn is_quiet(&self) -> bool {
        self.env.is_idle()
    }

    fn frequency(&self) -> f32 {
        self.oscs[0].frequency()
    }
}
