//! Short-time magnitude spectrum.
//!
//! Every frame is multiplied by a symmetric Hann window
//! (`w[n] = 0.5 − 0.5·cos(2πn / (N − 1))`) and transformed with a forward
//! FFT.  Only the non-negative frequency bins `0..=N/2` are kept; bin `k`
//! sits at `k · sample_rate / N` Hz.
//!
//! All ratio-style descriptors return `0.0` on an all-zero spectrum instead
//! of dividing by zero.

use std::collections::HashMap;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

// ---------------------------------------------------------------------------
// Spectrum
// ---------------------------------------------------------------------------

/// Magnitude spectrum of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f32>,
    bin_hz: f32,
}

impl Spectrum {
    /// Wrap precomputed magnitudes spaced `bin_hz` apart, starting at 0 Hz.
    pub fn from_magnitudes(magnitudes: Vec<f32>, bin_hz: f32) -> Self {
        Self { magnitudes, bin_hz }
    }

    /// Bin magnitudes, lowest frequency first.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Frequency spacing between bins in Hz.
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    /// Returns `true` for a spectrum without bins.
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    fn frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_hz
    }

    fn total(&self) -> f32 {
        self.magnitudes.iter().sum()
    }

    /// Magnitude-weighted mean frequency.
    pub fn centroid(&self) -> f32 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f32 = self
            .magnitudes
            .iter()
            .enumerate()
            .map(|(k, &m)| self.frequency(k) * m)
            .sum();
        weighted / total
    }

    /// Magnitude-weighted standard deviation of frequency around the
    /// centroid.
    pub fn bandwidth(&self) -> f32 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let centroid = self.centroid();
        let spread: f32 = self
            .magnitudes
            .iter()
            .enumerate()
            .map(|(k, &m)| {
                let d = self.frequency(k) - centroid;
                d * d * m
            })
            .sum();
        (spread / total).max(0.0).sqrt()
    }

    /// Lowest bin frequency at which the cumulative energy (`|X|²`) reaches
    /// `fraction` of the total energy.
    pub fn rolloff(&self, fraction: f32) -> f32 {
        let energy: f32 = self.magnitudes.iter().map(|m| m * m).sum();
        if energy <= 0.0 {
            return 0.0;
        }
        let target = energy * fraction.clamp(0.0, 1.0);
        let mut cumulative = 0.0_f32;
        for (k, m) in self.magnitudes.iter().enumerate() {
            cumulative += m * m;
            if cumulative >= target {
                return self.frequency(k);
            }
        }
        self.frequency(self.magnitudes.len().saturating_sub(1))
    }

    /// The spectrum scaled to unit sum; an all-zero spectrum stays zero.
    pub fn normalized(&self) -> Spectrum {
        let total = self.total();
        let magnitudes = if total > 0.0 {
            self.magnitudes.iter().map(|m| m / total).collect()
        } else {
            self.magnitudes.clone()
        };
        Spectrum {
            magnitudes,
            bin_hz: self.bin_hz,
        }
    }

    /// L2 distance between the unit-sum normalized versions of `self` and
    /// `previous`.  Returns `0.0` when the bin counts differ.
    pub fn flux(&self, previous: &Spectrum) -> f32 {
        if self.len() != previous.len() {
            return 0.0;
        }
        let current = self.normalized();
        let previous = previous.normalized();
        current
            .magnitudes
            .iter()
            .zip(&previous.magnitudes)
            .map(|(c, p)| (c - p) * (c - p))
            .sum::<f32>()
            .sqrt()
    }
}

// ---------------------------------------------------------------------------
// SpectrumAnalyzer
// ---------------------------------------------------------------------------

/// Windowed FFT with cached plans and windows per frame length.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    plans: HashMap<usize, (Arc<dyn Fft<f32>>, Vec<f32>)>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("cached_lengths", &self.plans.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    /// Create an analyzer with an empty plan cache.
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: HashMap::new(),
            scratch: Vec::new(),
        }
    }

    /// Compute the Hann-windowed magnitude spectrum of `samples`.
    ///
    /// Frames with fewer than two samples produce an empty spectrum.
    pub fn analyze(&mut self, samples: &[f32], sample_rate: u32) -> Spectrum {
        let n = samples.len();
        if n < 2 || sample_rate == 0 {
            return Spectrum::from_magnitudes(Vec::new(), 0.0);
        }

        let planner = &mut self.planner;
        let (fft, window) = self
            .plans
            .entry(n)
            .or_insert_with(|| (planner.plan_fft_forward(n), hann(n)));

        self.scratch.clear();
        self.scratch.extend(
            samples
                .iter()
                .zip(window.iter())
                .map(|(&x, &w)| Complex::new(x * w, 0.0)),
        );
        fft.process(&mut self.scratch);

        let magnitudes = self.scratch[..=n / 2].iter().map(|c| c.norm()).collect();
        Spectrum::from_magnitudes(magnitudes, sample_rate as f32 / n as f32)
    }
}

/// Symmetric Hann window of length `n`.
fn hann(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, n: usize, sample_rate: u32) -> Vec<f32> {
        (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn bin_layout_matches_frame_length() {
        let mut analyzer = SpectrumAnalyzer::new();
        let spectrum = analyzer.analyze(&vec![0.1_f32; 400], 16_000);
        assert_eq!(spectrum.len(), 201);
        assert!((spectrum.bin_hz() - 40.0).abs() < 1e-6);
    }

    #[test]
    fn sine_peaks_at_its_frequency() {
        let mut analyzer = SpectrumAnalyzer::new();
        let spectrum = analyzer.analyze(&sine(1_000.0, 0.5, 400, 16_000), 16_000);

        let peak_bin = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak_bin, 25); // 1000 Hz / 40 Hz per bin

        let centroid = spectrum.centroid();
        assert!((centroid - 1_000.0).abs() < 40.0, "centroid = {centroid}");
        assert!(spectrum.bandwidth() < 500.0);
    }

    #[test]
    fn rolloff_covers_sine_energy() {
        let mut analyzer = SpectrumAnalyzer::new();
        let spectrum = analyzer.analyze(&sine(2_000.0, 0.5, 400, 16_000), 16_000);
        let rolloff = spectrum.rolloff(0.95);
        assert!(
            (1_960.0..=2_080.0).contains(&rolloff),
            "rolloff = {rolloff}"
        );
    }

    #[test]
    fn zero_spectrum_defaults_to_zero() {
        let mut analyzer = SpectrumAnalyzer::new();
        let spectrum = analyzer.analyze(&vec![0.0_f32; 400], 16_000);
        assert_eq!(spectrum.centroid(), 0.0);
        assert_eq!(spectrum.bandwidth(), 0.0);
        assert_eq!(spectrum.rolloff(0.95), 0.0);
        assert_eq!(spectrum.flux(&spectrum), 0.0);
    }

    #[test]
    fn flux_ignores_level_changes() {
        let mut analyzer = SpectrumAnalyzer::new();
        let quiet = analyzer.analyze(&sine(500.0, 0.1, 400, 16_000), 16_000);
        let loud = analyzer.analyze(&sine(500.0, 0.8, 400, 16_000), 16_000);
        assert!(loud.flux(&quiet) < 1e-4);

        let other = analyzer.analyze(&sine(3_000.0, 0.1, 400, 16_000), 16_000);
        assert!(other.flux(&quiet) > 0.1);
    }

    #[test]
    fn flux_of_mismatched_lengths_is_zero() {
        let a = Spectrum::from_magnitudes(vec![1.0, 0.0], 10.0);
        let b = Spectrum::from_magnitudes(vec![1.0, 0.0, 0.0], 10.0);
        assert_eq!(a.flux(&b), 0.0);
    }

    #[test]
    fn degenerate_frames_produce_empty_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new();
        assert!(analyzer.analyze(&[0.5], 16_000).is_empty());
        assert!(analyzer.analyze(&[], 16_000).is_empty());
    }

    #[test]
    fn hann_window_is_symmetric_and_tapered() {
        let w = hann(5);
        assert!(w[0].abs() < 1e-7);
        assert!(w[4].abs() < 1e-7);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!((w[1] - w[3]).abs() < 1e-6);
    }
}
