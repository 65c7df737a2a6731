//! ADSR amplitude envelope
//!
//! Linear attack/decay/release segments with a sustain plateau. Voices
//! drive it per sample; `is_idle` gates voice reclamation.

/// Envelope segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope generator
#[derive(Debug, Clone)]
pub struct Envelope {
    attack_secs: f32,
    decay_secs: f32,
    sustain: f32,
    release_secs: f32,
    sample_rate: f32,
    phase: Phase,
    value: f32,
    /// Level the release started from
    release_from: f32,
    /// Position within the current segment, in samples
    segment_pos: f32,
}

impl Envelope {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32, sample_rate: u32) -> Self {
        Self {
            attack_secs: attack.max(0.0),
            decay_secs: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release_secs: release.max(0.0),
            sample_rate: sample_rate as f32,
            phase: Phase::Idle,
            value: 0.0,
            release_from: 0.0,
            segment_pos: 0.0,
        }
    }

    /// Start (or restart) the envelope from the beginning of the attack
    pub fn trigger(&mut self) {
        self.phase = Phase::Attack;
        self.segment_pos = 0.0;
    }

    /// Enter the release segment from the current level
    pub fn release(&mut self) {
        if self.phase != Phase::Idle {
            self.release_from = self.value;
            self.phase = Phase::Release;
            self.segment_pos = 0.0;
        }
    }

    /// Hard stop: straight to idle, no release tail
    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
        self.value = 0.0;
        self.segment_pos = 0.0;
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Advance one sample and return the current gain (0..1)
    #[inline]
    pub fn next(&mut self) -> f32 {
        match self.phase {
            Phase::Idle => {
                self.value = 0.0;
            }
            Phase::Attack => {
                let len = (self.attack_secs * self.sample_rate).max(1.0);
                self.value = (self.segment_pos / len).min(1.0);
                self.segment_pos += 1.0;
                if self.segment_pos >= len {
                    self.phase = Phase::Decay;
                    self.segment_pos = 0.0;
                }
            }
            Phase::Decay => {
                let len = (self.decay_secs * self.sample_rate).max(1.0);
                let t = (self.segment_pos / len).min(1.0);
                self.value = 1.0 + (self.sustain - 1.0) * t;
                self.segment_pos += 1.0;
                if self.segment_pos >= len {
                    self.phase = Phase::Sustain;
                    self.segment_pos = 0.0;
                }
            }
            Phase::Sustain => {
                self.value = self.sustain;
            }
            Phase::Release => {
                let len = (self.release_secs * self.sample_rate).max(1.0);
                let t = (self.segment_pos / len).min(1.0);
                self.value = self.release_from * (1.0 - t);
                self.segment_pos += 1.0;
                if self.segment_pos >= len {
                    self.stop();
                }
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    #[test]
    fn test_full_cycle_reaches_silence() {
        let mut env = Envelope::new(0.001, 0.01, 0.6, 0.01, SAMPLE_RATE);
        env.trigger();

        // Run through attack + decay into sustain
        let mut peak = 0.0f32;
        for _ in 0..2_000 {
            peak = peak.max(env.next());
        }
        assert!((peak - 1.0).abs() < 0.05, "peak = {peak}");
        assert!((env.next() - 0.6).abs() < 0.05);

        env.release();
        for _ in 0..2_000 {
            env.next();
        }
        assert!(env.is_idle());
        assert_eq!(env.next(), 0.0);
    }

    #[test]
    fn test_release_without_trigger_stays_idle() {
        let mut env = Envelope::new(0.01, 0.01, 0.5, 0.1, SAMPLE_RATE);
        env.release();
        assert!(env.is_idle());
    }

    #[test]
    fn test_stop_is_immediate() {
        let mut env = Envelope::new(0.001, 0.01, 0.8, 1.0, SAMPLE_RATE);
        env.trigger();
        for _ in 0..500 {
            env.next();
        }
        env.stop();
        assert!(env.is_idle());
        assert_eq!(env.next(), 0.0);
    }
}
