//! Per-frame audio analysis
//!
//! Taps the rendered output, runs a windowed FFT over the most recent
//! samples, and publishes an immutable snapshot per frame: normalized
//! frequency bins, the raw time-domain window, and derived scalar features
//! (band energies, peak frequency, spectral centroid, RMS, zero-crossing
//! rate). Consumers subscribe through a watch channel and always see a
//! complete snapshot, never a partially updated one.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use tokio::sync::watch;

use crate::types::StereoSample;

/// Exponential smoothing factor for bins and volume
const SMOOTHING: f32 = 0.8;

/// Bass band covers the lowest tenth of the bins
const BASS_SPLIT: usize = 10;

/// One frame of analysis output
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSnapshot {
    /// Normalized magnitude per bin, 0..1, DC first
    pub frequency: Vec<f32>,
    /// The raw sample window the bins were computed from
    pub time_domain: Vec<f32>,
    /// Smoothed overall level, 0..1
    pub volume: f32,
    pub bass_energy: f32,
    pub mid_energy: f32,
    pub treble_energy: f32,
    /// Frequency of the strongest bin in Hz
    pub peak_frequency: f32,
    /// Magnitude-weighted mean frequency in Hz
    pub spectral_centroid: f32,
    pub rms: f32,
    pub zero_crossing_rate: f32,
}

impl AnalysisSnapshot {
    /// All-zero snapshot published before the first full window
    pub fn empty(fft_size: usize) -> Self {
        Self {
            frequency: vec![0.0; fft_size / 2],
            time_domain: vec![0.0; fft_size],
            volume: 0.0,
            bass_energy: 0.0,
            mid_energy: 0.0,
            treble_energy: 0.0,
            peak_frequency: 0.0,
            spectral_centroid: 0.0,
            rms: 0.0,
            zero_crossing_rate: 0.0,
        }
    }
}

/// Scalar features derived from one analysis window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Features {
    pub bass_energy: f32,
    pub mid_energy: f32,
    pub treble_energy: f32,
    pub peak_frequency: f32,
    pub spectral_centroid: f32,
    pub rms: f32,
    pub zero_crossing_rate: f32,
}

/// Pure feature extraction over normalized bins and a time window
///
/// Band split: bass is the lowest tenth of the bins, mid runs up to half,
/// treble is the rest. Each energy is the mean magnitude of its band, so a
/// flat spectrum reports equal energy everywhere.
pub fn compute_features(frequency: &[f32], time_domain: &[f32], sample_rate: f32) -> Features {
    let n = frequency.len();
    if n < BASS_SPLIT {
        return Features::default();
    }

    let mean = |bins: &[f32]| {
        if bins.is_empty() {
            0.0
        } else {
            bins.iter().sum::<f32>() / bins.len() as f32
        }
    };
    let bass_energy = mean(&frequency[..n / BASS_SPLIT]);
    let mid_energy = mean(&frequency[n / BASS_SPLIT..n / 2]);
    let treble_energy = mean(&frequency[n / 2..]);

    // Bin width in Hz; bins span DC to Nyquist
    let bin_hz = sample_rate / 2.0 / n as f32;
    let total: f32 = frequency.iter().sum();
    let (peak_frequency, spectral_centroid) = if total > 1e-9 {
        let peak_bin = frequency
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let weighted: f32 = frequency
            .iter()
            .enumerate()
            .map(|(i, &m)| i as f32 * bin_hz * m)
            .sum();
        (peak_bin as f32 * bin_hz, weighted / total)
    } else {
        (0.0, 0.0)
    };

    let rms = if time_domain.is_empty() {
        0.0
    } else {
        (time_domain.iter().map(|s| s * s).sum::<f32>() / time_domain.len() as f32).sqrt()
    };

    let crossings = time_domain
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let zero_crossing_rate = if time_domain.len() > 1 {
        crossings as f32 / (time_domain.len() - 1) as f32
    } else {
        0.0
    };

    Features {
        bass_energy,
        mid_energy,
        treble_energy,
        peak_frequency,
        spectral_centroid,
        rms,
        zero_crossing_rate,
    }
}

/// Output tap plus FFT pipeline
pub struct AnalysisFeed {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_size: usize,
    sample_rate: f32,
    /// Ring of the most recent mono samples
    ring: Vec<f32>,
    write_pos: usize,
    filled: usize,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    /// Smoothed normalized bins carried across frames
    bins: Vec<f32>,
    volume: f32,
    /// The snapshot published before the current one
    previous: Arc<AnalysisSnapshot>,
    tx: watch::Sender<Arc<AnalysisSnapshot>>,
}

impl AnalysisFeed {
    pub fn new(fft_size: usize, sample_rate: u32) -> Self {
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let spectrum = fft.make_output_vec();
        // Hann window
        let window = (0..fft_size)
            .map(|i| {
                let phase = i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * phase).cos())
            })
            .collect();
        let empty = Arc::new(AnalysisSnapshot::empty(fft_size));
        let (tx, _) = watch::channel(empty.clone());
        Self {
            fft,
            fft_size,
            sample_rate: sample_rate as f32,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            filled: 0,
            window,
            input: vec![0.0; fft_size],
            spectrum,
            bins: vec![0.0; fft_size / 2],
            volume: 0.0,
            previous: empty,
            tx,
        }
    }

    /// Update the rate used for frequency-scaled features
    ///
    /// Device backends only learn their real rate during activation, after
    /// the feed has been constructed.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
    }

    /// Watch the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<AnalysisSnapshot>> {
        self.tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<AnalysisSnapshot> {
        self.tx.borrow().clone()
    }

    /// The snapshot before the current one (frame-to-frame deltas)
    pub fn previous(&self) -> Arc<AnalysisSnapshot> {
        self.previous.clone()
    }

    /// Feed rendered output into the tap (downmixed to mono)
    pub fn push_block(&mut self, block: &[StereoSample]) {
        for frame in block {
            self.ring[self.write_pos] = frame.mono();
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
        self.filled = (self.filled + block.len()).min(self.fft_size);
    }

    /// Analyze the current window and publish a new snapshot
    ///
    /// Publishes nothing until a full window has been collected, so early
    /// subscribers see the empty snapshot rather than garbage.
    pub fn tick(&mut self) {
        if self.filled < self.fft_size {
            return;
        }

        // Unroll the ring oldest-first
        let mut time_domain = vec![0.0f32; self.fft_size];
        for (i, sample) in time_domain.iter_mut().enumerate() {
            *sample = self.ring[(self.write_pos + i) % self.fft_size];
        }
        for (dst, (&sample, &w)) in self
            .input
            .iter_mut()
            .zip(time_domain.iter().zip(self.window.iter()))
        {
            *dst = sample * w;
        }

        if let Err(err) = self.fft.process(&mut self.input, &mut self.spectrum) {
            log::warn!("fft failed, skipping analysis frame: {err}");
            return;
        }

        // Normalize to 0..1 and smooth against the previous frame
        let scale = 2.0 / self.fft_size as f32;
        for (bin, c) in self.bins.iter_mut().zip(self.spectrum.iter()) {
            let magnitude = (c.norm() * scale).min(1.0);
            *bin = SMOOTHING * *bin + (1.0 - SMOOTHING) * magnitude;
        }

        let features = compute_features(&self.bins, &time_domain, self.sample_rate);
        self.volume = SMOOTHING * self.volume + (1.0 - SMOOTHING) * features.rms.min(1.0);

        self.previous = self.tx.send_replace(Arc::new(AnalysisSnapshot {
            frequency: self.bins.clone(),
            time_domain,
            volume: self.volume,
            bass_energy: features.bass_energy,
            mid_energy: features.mid_energy,
            treble_energy: features.treble_energy,
            peak_frequency: features.peak_frequency,
            spectral_centroid: features.spectral_centroid,
            rms: features.rms,
            zero_crossing_rate: features.zero_crossing_rate,
        }));
    }

    /// Drop all tapped audio and republish the empty snapshot
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.bins.fill(0.0);
        self.write_pos = 0;
        self.filled = 0;
        self.volume = 0.0;
        self.previous = Arc::new(AnalysisSnapshot::empty(self.fft_size));
        self.tx.send_replace(self.previous.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFT_SIZE: usize = 2048;
    const SAMPLE_RATE: u32 = 48_000;

    fn sine_block(freq: f32, len: usize) -> Vec<StereoSample> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32;
                StereoSample::from_mono(phase.sin() * 0.8)
            })
            .collect()
    }

    #[test]
    fn test_flat_spectrum_has_equal_band_energies() {
        let bins = vec![0.5f32; 1024];
        let features = compute_features(&bins, &[], SAMPLE_RATE as f32);
        assert!((features.bass_energy - 0.5).abs() < 1e-6);
        assert!((features.mid_energy - 0.5).abs() < 1e-6);
        assert!((features.treble_energy - 0.5).abs() < 1e-6);
        // Centroid of a flat spectrum sits at the middle of the range
        assert!((features.spectral_centroid - 11_994.1).abs() < 50.0);
    }

    #[test]
    fn test_silence_has_no_features() {
        let features = compute_features(&vec![0.0; 1024], &vec![0.0; 2048], SAMPLE_RATE as f32);
        assert_eq!(features.peak_frequency, 0.0);
        assert_eq!(features.spectral_centroid, 0.0);
        assert_eq!(features.rms, 0.0);
        assert_eq!(features.zero_crossing_rate, 0.0);
    }

    #[test]
    fn test_no_snapshot_before_full_window() {
        let mut feed = AnalysisFeed::new(FFT_SIZE, SAMPLE_RATE);
        feed.push_block(&sine_block(440.0, FFT_SIZE / 2));
        feed.tick();
        assert_eq!(*feed.snapshot(), AnalysisSnapshot::empty(FFT_SIZE));
    }

    #[test]
    fn test_sine_lands_in_the_right_bin() {
        let mut feed = AnalysisFeed::new(FFT_SIZE, SAMPLE_RATE);
        // 3000 Hz is exactly bin 128 at 48 kHz / 2048
        feed.push_block(&sine_block(3000.0, FFT_SIZE));
        feed.tick();
        let snapshot = feed.snapshot();

        let bin_hz = SAMPLE_RATE as f32 / FFT_SIZE as f32;
        assert!(
            (snapshot.peak_frequency - 3000.0).abs() <= bin_hz,
            "peak at {} Hz",
            snapshot.peak_frequency
        );
        // Two crossings per cycle
        let expected_zcr = 2.0 * 3000.0 / SAMPLE_RATE as f32;
        assert!((snapshot.zero_crossing_rate - expected_zcr).abs() < 0.01);
        assert!(snapshot.rms > 0.4 && snapshot.rms < 0.7, "rms = {}", snapshot.rms);
        assert!(snapshot.mid_energy > snapshot.treble_energy);
    }

    #[test]
    fn test_late_sample_rate_rescales_features() {
        // A feed constructed before the device rate is known
        let mut feed = AnalysisFeed::new(FFT_SIZE, 0);
        feed.set_sample_rate(SAMPLE_RATE);
        feed.push_block(&sine_block(3000.0, FFT_SIZE));
        feed.tick();

        let snapshot = feed.snapshot();
        let bin_hz = SAMPLE_RATE as f32 / FFT_SIZE as f32;
        assert!(
            (snapshot.peak_frequency - 3000.0).abs() <= bin_hz,
            "peak at {} Hz",
            snapshot.peak_frequency
        );
    }

    #[test]
    fn test_smoothing_carries_across_frames() {
        let mut feed = AnalysisFeed::new(FFT_SIZE, SAMPLE_RATE);
        feed.push_block(&sine_block(3000.0, FFT_SIZE));
        feed.tick();
        let loud = feed.snapshot().frequency.iter().sum::<f32>();

        // Silence next frame: bins decay by the smoothing factor, not to zero
        feed.push_block(&vec![StereoSample::zero(); FFT_SIZE]);
        feed.tick();
        let decayed = feed.snapshot().frequency.iter().sum::<f32>();
        assert!(decayed > 0.0);
        assert!((decayed / loud - SMOOTHING).abs() < 0.01);
    }

    #[test]
    fn test_previous_snapshot_lags_by_one_frame() {
        let mut feed = AnalysisFeed::new(FFT_SIZE, SAMPLE_RATE);
        feed.push_block(&sine_block(3000.0, FFT_SIZE));
        feed.tick();
        let first = feed.snapshot();
        assert_eq!(*feed.previous(), AnalysisSnapshot::empty(FFT_SIZE));

        feed.push_block(&sine_block(3000.0, FFT_SIZE));
        feed.tick();
        assert_eq!(feed.previous(), first);
    }

    #[test]
    fn test_reset_republishes_empty() {
        let mut feed = AnalysisFeed::new(FFT_SIZE, SAMPLE_RATE);
        feed.push_block(&sine_block(440.0, FFT_SIZE));
        feed.tick();
        assert!(feed.snapshot().rms > 0.0);
        feed.reset();
        assert_eq!(*feed.snapshot(), AnalysisSnapshot::empty(FFT_SIZE));
    }
}
