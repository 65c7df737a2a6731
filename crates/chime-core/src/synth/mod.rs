//! Synthesis voices
//!
//! A voice is a single sound-producing unit bound to one effect chain at a
//! time. Three flavors exist: plain notes, triad chords, and membrane-style
//! beats. Voices are pooled; [`Resettable`] defines the documented baseline
//! state they return to when released back to the pool.

mod beat;
mod chord;
mod envelope;
mod note;
mod oscillator;

pub use beat::BeatVoice;
pub use chord::ChordVoice;
pub use envelope::Envelope;
pub use note::NoteVoice;
pub use oscillator::{Oscillator, Waveform};

use crate::types::VoiceType;

/// Note envelope constants (seconds)
pub const NOTE_ATTACK: f32 = 0.005;
pub const NOTE_RELEASE: f32 = 0.3;

/// Chord envelope constants (seconds)
pub const CHORD_ATTACK: f32 = 0.05;
pub const CHORD_RELEASE: f32 = 0.8;

/// Beat (membrane) constants
pub const BEAT_PITCH_DECAY: f32 = 0.05;
pub const BEAT_ATTACK: f32 = 0.001;
pub const BEAT_DECAY: f32 = 0.4;
pub const BEAT_SUSTAIN: f32 = 0.01;
pub const BEAT_RELEASE: f32 = 0.4;

/// Baseline frequency voices reset to on pool release
pub const BASELINE_FREQUENCY: f32 = 440.0;

/// Baseline output level on pool release
pub const BASELINE_LEVEL: f32 = 1.0;

/// Tone presets for note and chord voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthPreset {
    /// Bright mono lead (default for notes)
    #[default]
    Lead,
    /// Soft sustained pad (default for chords)
    Pad,
}

impl SynthPreset {
    /// (waveform, attack, decay, sustain, release)
    pub fn adsr(&self) -> (Waveform, f32, f32, f32, f32) {
        match self {
            SynthPreset::Lead => (Waveform::Sine, NOTE_ATTACK, 0.15, 0.5, NOTE_RELEASE),
            SynthPreset::Pad => (Waveform::Triangle, CHORD_ATTACK, 0.3, 0.7, CHORD_RELEASE),
        }
    }
}

/// A single trigger: frequencies to sound, how long, how hard
#[derive(Debug, Clone)]
pub struct VoiceTrigger {
    /// Frequencies in Hz (one for notes/beats, up to three for chords)
    pub freqs: Vec<f32>,
    /// Time until the envelope auto-releases (seconds); 0 means sustain
    /// until an explicit release
    pub duration_secs: f32,
    /// Velocity scaling, 0..1
    pub velocity: f32,
}

impl VoiceTrigger {
    pub fn new(freqs: Vec<f32>, duration_secs: f32) -> Self {
        Self {
            freqs,
            duration_secs,
            velocity: 1.0,
        }
    }
}

/// Reset-to-baseline capability for pooled resources
///
/// Release back to the pool restores level, frequency, and silence through
/// this trait rather than by inspecting fields at runtime.
pub trait Resettable {
    /// Restore the documented baseline parameter state and stop any active
    /// sound production
    fn reset(&mut self);
}

impl Resettable for Box<dyn Voice> {
    fn reset(&mut self) {
        (**self).reset()
    }
}

/// A sound-producing synthesis unit
pub trait Voice: Resettable + Send {
    /// Which pool key this voice belongs to
    fn voice_type(&self) -> VoiceType;

    /// Start sounding
    fn trigger(&mut self, trigger: &VoiceTrigger);

    /// Begin the envelope release
    fn release(&mut self);

    /// Render the next block of mono samples (overwrites `out`)
    fn render(&mut self, out: &mut [f32]);

    /// Whether the voice has fully decayed to silence
    fn is_quiet(&self) -> bool;

    /// Fundamental frequency currently configured (observability, tests)
    fn frequency(&self) -> f32;
}

/// Construct the voice flavor for a pool key
pub fn build_voice(voice_type: VoiceType, sample_rate: u32) -> Box<dyn Voice> {
    match voice_type {
        VoiceType::Note => Box::new(NoteVoice::new(SynthPreset::Lead, sample_rate)),
        VoiceType::Chord => Box::new(ChordVoice::new(SynthPreset::Pad, sample_rate)),
        VoiceType::Beat => Box::new(BeatVoice::new(sample_rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    #[test]
    fn test_build_voice_matches_type() {
        for voice_type in VoiceType::ALL {
            let voice = build_voice(voice_type, SAMPLE_RATE);
            assert_eq!(voice.voice_type(), voice_type);
            assert!(voice.is_quiet());
        }
    }

    #[test]
    fn test_voices_reset_to_baseline() {
        for voice_type in VoiceType::ALL {
            let mut voice = build_voice(voice_type, SAMPLE_RATE);
            voice.trigger(&VoiceTrigger::new(vec![987.0], 1.0));
            let mut block = vec![0.0f32; 512];
            voice.render(&mut block);
            assert!(!voice.is_quiet(), "{voice_type} should be sounding");

            voice.reset();
            assert!(voice.is_quiet(), "{voice_type} should be silent after reset");
            assert_eq!(voice.frequency(), BASELINE_FREQUENCY);
            voice.render(&mut block);
            assert!(block.iter().all(|&s| s == 0.0));
        }
    }
}
