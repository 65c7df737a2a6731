//! chime-core: a real-time procedural audio synthesis engine
//!
//! Objects in a scene make sound: each one gets a pooled synthesis voice
//! wired through its own effect chain into a shared master bus. The engine
//! activates lazily behind a user-gesture gate, retries flaky platform
//! audio with exponential backoff, keeps playing (without effects) when the
//! master bus can't be built, and publishes a per-frame analysis snapshot
//! of whatever it renders.
//!
//! ```no_run
//! use chime_core::{AudioEngine, EngineConfig, PlayOptions, VoiceType};
//!
//! # async fn demo() {
//! let engine = AudioEngine::new(EngineConfig::default());
//! engine.enable();
//! engine.play_voice("rock-1", VoiceType::Note, PlayOptions::default()).await;
//! # }
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod effect;
pub mod engine;
pub mod music;
pub mod synth;
pub mod types;

pub use analysis::{AnalysisFeed, AnalysisSnapshot};
pub use audio::{AudioBackend, EngineError, EngineResult, OfflineBackend};
#[cfg(feature = "cpal-backend")]
pub use audio::CpalBackend;
pub use config::{EngineConfig, PoolConfig, RetryConfig};
pub use engine::{
    AudioEngine, EffectParams, EngineEvent, EngineState, PerformanceMetrics, PlayOptions,
    PoolStats, StartOutcome,
};
pub use music::{note_frequency, Interval, Note};
pub use types::{StereoSample, VoiceType, BLOCK_SIZE, SAMPLE_RATE};
