//! Per-frame acoustic descriptors.
//!
//! [`FeatureExtractor`] turns each [`Frame`] into a [`FeatureVector`]:
//!
//! | Feature | Definition |
//! |---------|------------|
//! | `rms` | `sqrt(mean(x²))` |
//! | `zero_crossing_rate` | sign changes between adjacent samples / (N − 1) |
//! | `spectral_centroid` | magnitude-weighted mean frequency (Hz) |
//! | `spectral_bandwidth` | magnitude-weighted std-dev around the centroid (Hz) |
//! | `spectral_flux` | L2 distance to the previous frame's normalized spectrum |
//! | `peak_to_peak` | `max(x) − min(x)` |
//! | `spectral_rolloff` | frequency below which 95 % of the energy lies (Hz) |
//! | `rms_p95` | 95th percentile of sub-window RMS values |
//! | `peak_amplitude` | `max(|x|)` |
//!
//! The extractor keeps the previous frame's spectrum so that flux can be
//! computed on a stream; the first frame after [`FeatureExtractor::reset`]
//! has a flux of `0.0`.
//!
//! # Example
//!
//! ```rust
//! use voice_quality::audio::{FeatureExtractor, FrameSource};
//! use voice_quality::config::FeatureConfig;
//!
//! let samples = vec![0.0_f32; 1_600];
//! let source = FrameSource::new(&samples, 16_000, 400, 160).unwrap();
//! let mut extractor = FeatureExtractor::new(FeatureConfig::default());
//!
//! for frame in source.frames() {
//!     let features = extractor.extract(&frame);
//!     // Silent frames never divide by zero.
//!     assert_eq!(features.rms, 0.0);
//!     assert_eq!(features.spectral_centroid, 0.0);
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::audio::frame::Frame;
use crate::audio::spectrum::{Spectrum, SpectrumAnalyzer};
use crate::config::FeatureConfig;

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// Names of the per-frame descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Rms,
    ZeroCrossingRate,
    SpectralCentroid,
    SpectralBandwidth,
    SpectralFlux,
    PeakToPeak,
    SpectralRolloff,
    RmsP95,
    PeakAmplitude,
}

impl Feature {
    /// Every feature, in declaration order.
    pub const ALL: [Feature; 9] = [
        Feature::Rms,
        Feature::ZeroCrossingRate,
        Feature::SpectralCentroid,
        Feature::SpectralBandwidth,
        Feature::SpectralFlux,
        Feature::PeakToPeak,
        Feature::SpectralRolloff,
        Feature::RmsP95,
        Feature::PeakAmplitude,
    ];

    /// The snake_case name used in profiles and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Rms => "rms",
            Feature::ZeroCrossingRate => "zero_crossing_rate",
            Feature::SpectralCentroid => "spectral_centroid",
            Feature::SpectralBandwidth => "spectral_bandwidth",
            Feature::SpectralFlux => "spectral_flux",
            Feature::PeakToPeak => "peak_to_peak",
            Feature::SpectralRolloff => "spectral_rolloff",
            Feature::RmsP95 => "rms_p95",
            Feature::PeakAmplitude => "peak_amplitude",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// FeatureVector
// ---------------------------------------------------------------------------

/// Descriptors of a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub rms: f32,
    pub zero_crossing_rate: f32,
    /// Hz.
    pub spectral_centroid: f32,
    /// Hz.
    pub spectral_bandwidth: f32,
    /// `0.0` on the first frame of a stream.
    pub spectral_flux: f32,
    pub peak_to_peak: f32,
    /// Hz.
    pub spectral_rolloff: f32,
    pub rms_p95: f32,
    pub peak_amplitude: f32,
}

impl FeatureVector {
    /// Look a descriptor up by name.
    pub fn get(&self, feature: Feature) -> f32 {
        match feature {
            Feature::Rms => self.rms,
            Feature::ZeroCrossingRate => self.zero_crossing_rate,
            Feature::SpectralCentroid => self.spectral_centroid,
            Feature::SpectralBandwidth => self.spectral_bandwidth,
            Feature::SpectralFlux => self.spectral_flux,
            Feature::PeakToPeak => self.peak_to_peak,
            Feature::SpectralRolloff => self.spectral_rolloff,
            Feature::RmsP95 => self.rms_p95,
            Feature::PeakAmplitude => self.peak_amplitude,
        }
    }
}

// ---------------------------------------------------------------------------
// Time-domain descriptors
// ---------------------------------------------------------------------------

/// Root-mean-square level; `0.0` for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

/// Fraction of adjacent sample pairs with strictly opposite signs.
///
/// Zero-valued samples never count as a crossing, so silence scores `0.0`.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| pair[0] * pair[1] < 0.0)
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

/// `max − min` of the samples; `0.0` for an empty slice.
pub fn peak_to_peak(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let (lo, hi) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    hi - lo
}

/// Largest absolute sample value.
pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// 95th percentile of the RMS of consecutive `subwindow`-sample chunks.
///
/// A trailing chunk shorter than half a sub-window is ignored; a frame
/// shorter than one sub-window falls back to the frame RMS.
pub fn rms_p95(samples: &[f32], subwindow: usize) -> f32 {
    if subwindow == 0 || samples.len() < subwindow {
        return rms(samples);
    }
    let levels: Vec<f32> = samples
        .chunks(subwindow)
        .filter(|chunk| chunk.len() * 2 >= subwindow)
        .map(rms)
        .collect();
    percentile(&levels, 95.0)
}

/// Percentile with linear interpolation between closest ranks.
///
/// `p` is in `[0, 100]`.  Returns `0.0` for an empty slice.
pub fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Computes [`FeatureVector`]s frame by frame.
#[derive(Debug)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    analyzer: SpectrumAnalyzer,
    /// Spectrum of the previous frame, used for flux.
    previous: Option<Spectrum>,
}

impl FeatureExtractor {
    /// Create an extractor with no previous frame.
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            analyzer: SpectrumAnalyzer::new(),
            previous: None,
        }
    }

    /// Forget the previous frame so the next one starts a new stream.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Extract the descriptors of `frame`, using and then replacing the
    /// stored previous spectrum.
    pub fn extract(&mut self, frame: &Frame<'_>) -> FeatureVector {
        let previous = self.previous.take();
        let (features, spectrum) = self.extract_with(frame, previous.as_ref());
        self.previous = Some(spectrum);
        features
    }

    /// Extract the descriptors of `frame` against an explicit predecessor
    /// spectrum, returning the frame's own spectrum alongside.
    pub fn extract_with(
        &mut self,
        frame: &Frame<'_>,
        previous: Option<&Spectrum>,
    ) -> (FeatureVector, Spectrum) {
        let samples = frame.samples;
        let spectrum = self.analyzer.analyze(samples, frame.sample_rate);

        let subwindow = (self.config.rms_subwindow_secs * frame.sample_rate as f64).round() as usize;

        let features = FeatureVector {
            rms: rms(samples),
            zero_crossing_rate: zero_crossing_rate(samples),
            spectral_centroid: spectrum.centroid(),
            spectral_bandwidth: spectrum.bandwidth(),
            spectral_flux: previous.map_or(0.0, |prev| spectrum.flux(prev)),
            peak_to_peak: peak_to_peak(samples),
            spectral_rolloff: spectrum.rolloff(self.config.rolloff_fraction),
            rms_p95: rms_p95(samples, subwindow),
            peak_amplitude: peak_amplitude(samples),
        };

        (features, spectrum)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
