//! Effect stages
//!
//! Every audio transformation in the graph — the master bus stages and the
//! per-voice private chains — implements [`Stage`]. Parameter writes go
//! through [`Stage::try_set`], which reports whether the stage supports the
//! parameter instead of erroring: an unsupported write is a defined no-op,
//! so callers never need defensive guards around platform or stage quirks.

mod bitcrusher;
mod chorus;
mod delay;
mod distortion;
mod filter;
mod gain;
mod meter;
mod panner;
mod reverb;

pub use bitcrusher::Bitcrusher;
pub use chorus::Chorus;
pub use delay::Delay;
pub use distortion::Distortion;
pub use filter::{Filter, FilterMode};
pub use gain::Gain;
pub use meter::LevelMeter;
pub use panner::SpatialPanner;
pub use reverb::Reverb;

use crate::types::StereoSample;

/// Parameter targets for safe stage writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageParam {
    /// Wet/dry mix, 0..1
    Wet,
    /// Feedback amount, 0..0.95
    Feedback,
    /// Center/cutoff frequency in Hz
    Frequency,
    /// Modulation depth, 0..1
    Depth,
    /// Bit depth, 1..16
    Bits,
    /// Drive amount, 0..1
    Drive,
    /// Linear output level, 0..1
    Level,
}

/// An audio transformation stage
///
/// Stages process stereo blocks in place and keep their own per-channel
/// state. `try_set` returns `false` for parameters the stage doesn't have,
/// and clamps the ones it does.
pub trait Stage: Send {
    /// Stage name for logs
    fn name(&self) -> &'static str;

    /// Process a stereo block in place
    fn process(&mut self, block: &mut [StereoSample]);

    /// Write a parameter if this stage supports it
    ///
    /// Supported parameters are clamped to their documented range; the
    /// return value says whether the write landed.
    fn try_set(&mut self, param: StageParam, value: f32) -> bool {
        let _ = (param, value);
        false
    }

    /// Clear all internal state (delay lines, filter history, meters)
    fn reset(&mut self);
}

/// Write a parameter, logging when the stage doesn't carry it
pub fn set_or_log(stage: &mut dyn Stage, param: StageParam, value: f32) {
    if !stage.try_set(param, value) {
        log::debug!("{}: ignoring unsupported parameter {param:?}", stage.name());
    }
}
