//! Common types for Chime
//!
//! Fundamental audio types shared across the engine: sample formats,
//! stereo frames, and the voice-type key used by the synthesis pool.

/// Default sample rate for the engine (48kHz - standard professional audio rate)
/// This is the default; the actual rate is read from the backend at activation.
pub const SAMPLE_RATE: u32 = 48_000;

/// Block size used by the frame renderer (samples per channel per tick)
pub const BLOCK_SIZE: usize = 1024;

/// Audio sample type (32-bit float throughout the signal graph)
pub type Sample = f32;

/// A single stereo frame (left and right channels)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo frame
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Silence
    #[inline]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Dual-mono frame (the same sample on both channels)
    #[inline]
    pub fn from_mono(sample: Sample) -> Self {
        Self {
            left: sample,
            right: sample,
        }
    }

    /// Mono mix of both channels
    #[inline]
    pub fn mono(&self) -> Sample {
        (self.left + self.right) * 0.5
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

/// Synthesis voice flavors, used as the resource-pool key
///
/// Each placed object triggers one of these. `Note` is a plain tone,
/// `Chord` a triad, `Beat` a membrane-style kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Note,
    Chord,
    Beat,
}

impl VoiceType {
    /// All voice types in order
    pub const ALL: [VoiceType; 3] = [VoiceType::Note, VoiceType::Chord, VoiceType::Beat];

    /// Get the name of this voice type
    pub fn name(&self) -> &'static str {
        match self {
            VoiceType::Note => "note",
            VoiceType::Chord => "chord",
            VoiceType::Beat => "beat",
        }
    }
}

impl std::fmt::Display for VoiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Clamp a value into `[lo, hi]`
///
/// Out-of-range parameter writes are clamped rather than rejected anywhere
/// in the engine, so callers never see an error for a wild slider value.
#[inline]
pub fn clamped(value: f32, lo: f32, hi: f32) -> f32 {
    value.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_type_names() {
        assert_eq!(VoiceType::Note.name(), "note");
        assert_eq!(VoiceType::Chord.name(), "chord");
        assert_eq!(VoiceType::Beat.name(), "beat");
        assert_eq!(VoiceType::ALL.len(), 3);
    }

    #[test]
    fn test_stereo_sample_ops() {
        let mut a = StereoSample::new(0.5, -0.5);
        a += StereoSample::new(0.25, 0.25);
        assert_eq!(a, StereoSample::new(0.75, -0.25));
        assert!((StereoSample::new(1.0, 0.0).mono() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamped() {
        assert_eq!(clamped(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamped(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamped(0.3, 0.0, 1.0), 0.3);
    }
}
