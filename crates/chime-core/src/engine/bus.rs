//! Master effect bus
//!
//! The shared output path every voice feeds into. The full bus runs
//! bitcrusher, distortion, sweep filter, reverb, delay, and chorus in a
//! fixed order, then master gain. When construction fails or times out the
//! engine falls
//! back to a degraded passthrough bus that only applies master gain, so
//! audio keeps flowing without effects.

use crate::effect::{
    Bitcrusher, Chorus, Delay, Distortion, Filter, FilterMode, Gain, Reverb, Stage, StageParam,
};
use crate::types::StereoSample;

/// Default reverb tail on the master bus (seconds)
const MASTER_REVERB_DECAY: f32 = 2.5;

/// Default master delay time (seconds)
const MASTER_DELAY_TIME: f32 = 0.35;

/// Sweep filter opens fully by default
const SWEEP_FILTER_OPEN_HZ: f32 = 20_000.0;

struct BusStages {
    bitcrusher: Bitcrusher,
    distortion: Distortion,
    sweep_filter: Filter,
    reverb: Reverb,
    delay: Delay,
    chorus: Chorus,
}

impl BusStages {
    fn build(sample_rate: u32) -> Self {
        Self {
            bitcrusher: Bitcrusher::new(16.0),
            distortion: Distortion::new(0.2),
            sweep_filter: Filter::new(FilterMode::LowPass, SWEEP_FILTER_OPEN_HZ, sample_rate),
            reverb: Reverb::new(MASTER_REVERB_DECAY, sample_rate),
            delay: Delay::new(MASTER_DELAY_TIME, sample_rate),
            chorus: Chorus::new(sample_rate),
        }
    }
}

/// Shared output bus
pub struct MasterBus {
    master: Gain,
    /// `None` in degraded passthrough mode
    stages: Option<BusStages>,
}

impl MasterBus {
    /// Build the full effect bus
    pub fn build(sample_rate: u32, master_volume: f32) -> Self {
        Self {
            master: Gain::from_volume(master_volume),
            stages: Some(BusStages::build(sample_rate)),
        }
    }

    /// Degraded fallback: master gain only, no effects
    pub fn passthrough(master_volume: f32) -> Self {
        log::warn!("master bus degraded to passthrough, effects disabled");
        Self {
            master: Gain::from_volume(master_volume),
            stages: None,
        }
    }

    /// Whether the bus is running without effects
    pub fn is_degraded(&self) -> bool {
        self.stages.is_none()
    }

    /// Process the mixed voice output in place; master gain runs last
    pub fn process(&mut self, block: &mut [StereoSample]) {
        if let Some(stages) = &mut self.stages {
            stages.bitcrusher.process(block);
            stages.distortion.process(block);
            stages.sweep_filter.process(block);
            stages.reverb.process(block);
            stages.delay.process(block);
            stages.chorus.process(block);
        }
        self.master.process(block);
    }

    /// Set master output volume, 0..1
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master.set_volume(volume);
    }

    /// Set chorus modulation depth, 0..1. No-op on a degraded bus.
    pub fn set_chorus_depth(&mut self, depth: f32) -> bool {
        self.stages
            .as_mut()
            .is_some_and(|s| s.chorus.try_set(StageParam::Depth, depth))
    }

    /// Set reverb wet mix, 0..1. No-op on a degraded bus.
    pub fn set_reverb_wet(&mut self, wet: f32) -> bool {
        self.stages
            .as_mut()
            .is_some_and(|s| s.reverb.try_set(StageParam::Wet, wet))
    }

    /// Set delay feedback, 0..0.95. No-op on a degraded bus.
    pub fn set_delay_feedback(&mut self, feedback: f32) -> bool {
        self.stages
            .as_mut()
            .is_some_and(|s| s.delay.try_set(StageParam::Feedback, feedback))
    }

    /// Set bitcrusher bit depth, 1..16. No-op on a degraded bus.
    pub fn set_bitcrusher_bits(&mut self, bits: f32) -> bool {
        self.stages
            .as_mut()
            .is_some_and(|s| s.bitcrusher.try_set(StageParam::Bits, bits))
    }

    /// Set the sweep filter cutoff in Hz. No-op on a degraded bus.
    pub fn set_filter_frequency(&mut self, frequency: f32) -> bool {
        self.stages
            .as_mut()
            .is_some_and(|s| s.sweep_filter.try_set(StageParam::Frequency, frequency))
    }

    /// Clear all stage state (delay lines, reverb tails, filter history)
    pub fn reset(&mut self) {
        if let Some(stages) = &mut self.stages {
            stages.bitcrusher.reset();
            stages.distortion.reset();
            stages.sweep_filter.reset();
            stages.reverb.reset();
            stages.delay.reset();
            stages.chorus.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(value: f32, len: usize) -> Vec<StereoSample> {
        vec![StereoSample::from_mono(value); len]
    }

    #[test]
    fn test_passthrough_applies_only_master_gain() {
        let mut bus = MasterBus::passthrough(1.0);
        assert!(bus.is_degraded());

        let mut block = block_of(0.5, 256);
        bus.process(&mut block);
        for frame in &block {
            assert!((frame.left - 0.5).abs() < 1e-6);
            assert!((frame.right - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_passthrough_rejects_effect_writes() {
        let mut bus = MasterBus::passthrough(0.8);
        assert!(!bus.set_reverb_wet(0.5));
        assert!(!bus.set_chorus_depth(0.5));
        assert!(!bus.set_delay_feedback(0.5));
        assert!(!bus.set_bitcrusher_bits(4.0));
        assert!(!bus.set_filter_frequency(500.0));
    }

    #[test]
    fn test_full_bus_accepts_effect_writes() {
        let mut bus = MasterBus::build(48_000, 0.8);
        assert!(!bus.is_degraded());
        assert!(bus.set_reverb_wet(0.4));
        assert!(bus.set_chorus_depth(0.3));
        assert!(bus.set_delay_feedback(0.6));
        assert!(bus.set_bitcrusher_bits(8.0));
        assert!(bus.set_filter_frequency(1_500.0));
    }

    #[test]
    fn test_master_volume_zero_silences_output() {
        let mut bus = MasterBus::build(48_000, 0.8);
        bus.set_master_volume(0.0);
        let mut block = block_of(0.7, 1024);
        bus.process(&mut block);
        assert!(block.iter().all(|f| f.left == 0.0 && f.right == 0.0));
    }

    #[test]
    fn test_full_bus_output_is_finite() {
        let mut bus = MasterBus::build(48_000, 0.8);
        bus.set_reverb_wet(1.0);
        bus.set_delay_feedback(0.95);
        let mut block = block_of(0.9, 4096);
        bus.process(&mut block);
        assert!(block
            .iter()
            .all(|f| f.left.is_finite() && f.right.is_finite()));
    }
}
