//! Engine error types

use thiserror::Error;

/// Errors that can occur in the audio engine
///
/// Only `PlatformUnsupported` and `RetriesExhausted` are terminal; everything
/// else is either retried with backoff or degraded gracefully so one failing
/// voice or effect never halts unrelated playback.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// The platform has no audio primitive at all. Fatal, never retried.
    #[error("Platform audio is not supported on this system")]
    PlatformUnsupported,

    /// Engine start requested before the enable gate was set
    #[error("Audio engine is not enabled; call enable() after a user gesture")]
    NotEnabled,

    /// Backend activation exceeded its timeout. Retryable.
    #[error("Audio activation timed out after {0} ms")]
    InitTimeout(u64),

    /// Backend activation failed. Retryable.
    #[error("Audio activation failed: {0}")]
    InitFailure(String),

    /// Activation retry cap exceeded; the engine is in the `Failed` state
    #[error("Audio activation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Master bus construction failed; the engine degraded to a passthrough
    /// bus. Surfaced only in logs, never across the public boundary.
    #[error("Master effect bus construction failed: {0}")]
    EffectBusConstruction(String),

    /// A voice trigger failed; the public API reports this as `false`
    #[error("Voice trigger failed: {0}")]
    VoiceTrigger(String),

    /// The engine was disposed while an operation was waiting on it
    #[error("Audio engine was disposed")]
    Disposed,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
