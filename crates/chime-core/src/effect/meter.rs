//! Level meter
//!
//! Reads the signal without modifying it: per-block rms folded into an
//! exponentially smoothed level in the normal 0..1 range.

use super::Stage;
use crate::types::StereoSample;

/// Smoothing constant (fraction of the previous level retained per block)
const SMOOTHING: f32 = 0.8;

/// Smoothed rms meter stage
#[derive(Debug, Default)]
pub struct LevelMeter {
    level: f32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current smoothed level, 0..1
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Stage for LevelMeter {
    fn name(&self) -> &'static str {
        "meter"
    }

    fn process(&mut self, block: &mut [StereoSample]) {
        if block.is_empty() {
            return;
        }
        let sum: f32 = block
            .iter()
            .map(|s| {
                let m = s.mono();
                m * m
            })
            .sum();
        let rms = (sum / block.len() as f32).sqrt().min(1.0);
        self.level = self.level * SMOOTHING + rms * (1.0 - SMOOTHING);
    }

    fn reset(&mut self) {
        self.level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_rises_and_falls() {
        let mut meter = LevelMeter::new();
        let mut loud = vec![StereoSample::new(0.8, 0.8); 256];
        for _ in 0..20 {
            meter.process(&mut loud);
        }
        let peak = meter.level();
        assert!(peak > 0.5, "level = {peak}");

        let mut silence = vec![StereoSample::zero(); 256];
        for _ in 0..20 {
            meter.process(&mut silence);
        }
        assert!(meter.level() < peak * 0.05);
    }

    #[test]
    fn test_meter_does_not_modify_signal() {
        let mut meter = LevelMeter::new();
        let original = vec![StereoSample::new(0.3, -0.2); 64];
        let mut block = original.clone();
        meter.process(&mut block);
        assert_eq!(block, original);
    }
}
