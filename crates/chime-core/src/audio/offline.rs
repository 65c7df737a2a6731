//! Offline audio backend
//!
//! An in-process sink with no device dependency. The engine renders into it
//! and the analysis feed taps the same blocks, so visualization works even
//! where no output device exists (headless hosts, CI, tests).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::backend::AudioBackend;
use super::error::EngineResult;
use crate::types::{StereoSample, SAMPLE_RATE};

/// Backend that accepts rendered audio without a device
///
/// Tracks a running output peak so hosts can show a crude master level even
/// without a device tap.
#[derive(Debug)]
pub struct OfflineBackend {
    active: AtomicBool,
    activations: AtomicU32,
    sample_rate: u32,
    peak: Mutex<f32>,
}

impl OfflineBackend {
    /// Create an offline backend at the default sample rate
    pub fn new() -> Self {
        Self::with_sample_rate(SAMPLE_RATE)
    }

    /// Create an offline backend at a specific sample rate
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            active: AtomicBool::new(false),
            activations: AtomicU32::new(0),
            sample_rate,
            peak: Mutex::new(0.0),
        }
    }

    /// Peak absolute sample value seen since the last call (resets on read)
    pub fn take_peak(&self) -> f32 {
        let mut peak = self.peak.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *peak)
    }

    /// Whether the backend has been activated
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn is_supported(&self) -> bool {
        true
    }

    fn activate(&self) -> EngineResult<()> {
        if !self.active.swap(true, Ordering::AcqRel) {
            self.activations.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&self, block: &[StereoSample]) {
        if !self.is_active() {
            return;
        }
        let block_peak = block
            .iter()
            .map(|s| s.left.abs().max(s.right.abs()))
            .fold(0.0f32, f32::max);
        let mut peak = self.peak.lock().unwrap_or_else(|e| e.into_inner());
        *peak = peak.max(block_peak);
    }

    fn activation_count(&self) -> u32 {
        self.activations.load(Ordering::Acquire)
    }
}
