//! Audio backend trait for platform-specific implementations
//!
//! The engine talks to the platform audio primitive through this boundary:
//! - `OfflineBackend`: in-process sink, always available (default, tests)
//! - `CpalBackend`: real device output (feature = "cpal-backend")
//!
//! Activation is synchronous from the backend's point of view; the lifecycle
//! controller wraps it in a timeout so a hung driver becomes a retryable
//! failure instead of blocking the event loop.

use super::error::EngineResult;
use crate::types::StereoSample;

/// Platform audio boundary
///
/// Implementations must be cheap to share (`Arc<dyn AudioBackend>`); all
/// methods may be called from the controller's blocking-task context.
pub trait AudioBackend: Send + Sync {
    /// Whether the platform audio primitive exists at all
    ///
    /// Returning `false` is fatal: the controller fails with
    /// `PlatformUnsupported` and never retries.
    fn is_supported(&self) -> bool;

    /// Activate the output device
    ///
    /// Called once per activation attempt. Must be idempotent: a second call
    /// after success is a no-op returning `Ok(())`.
    fn activate(&self) -> EngineResult<()>;

    /// Device-side preparation for the shared effect bus
    ///
    /// Runs inside the bus-construction step after activation succeeds. An
    /// error here degrades the engine to the passthrough bus instead of
    /// failing the activation.
    fn prepare_effects(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Sample rate of the active output
    fn sample_rate(&self) -> u32;

    /// Output buffer size in frames, if the platform reports one
    fn buffer_size(&self) -> Option<u32> {
        None
    }

    /// Push a rendered block to the output
    ///
    /// Never blocks: backends that can't keep up drop frames.
    fn write(&self, block: &[StereoSample]);

    /// Number of activation attempts observed by this backend
    ///
    /// Used to verify that concurrent `start()` callers share a single
    /// activation sequence.
    fn activation_count(&self) -> u32;
}
