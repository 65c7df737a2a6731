//! Phase-accumulating oscillator

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
}

/// Single oscillator with a normalized phase accumulator
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f32,
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: u32) -> Self {
        let mut osc = Self {
            waveform,
            frequency: 0.0,
            phase: 0.0,
            phase_inc: 0.0,
            sample_rate: sample_rate as f32,
        };
        osc.set_frequency(frequency);
        osc
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency.max(0.0);
        self.phase_inc = self.frequency / self.sample_rate;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    /// Next sample in -1..1
    #[inline]
    pub fn next(&mut self) -> f32 {
        let phase = self.phase;
        self.phase = (self.phase + self.phase_inc).fract();
        match self.waveform {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}
