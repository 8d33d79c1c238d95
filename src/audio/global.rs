//! Whole-recording descriptors.
//!
//! Frame features catch discrete events.  A recording that is degraded from
//! start to finish (codec artefacts, synthetic or heavily processed speech)
//! looks self-consistent frame to frame, so it is summarised here over the
//! entire waveform instead:
//!
//! | Group | Descriptors |
//! |-------|-------------|
//! | Level | `rms`, `rms_db`, `dynamic_range`, `crest_factor` |
//! | Spectrum | power-weighted centroid and bandwidth, band ratios below 1 kHz, 1–4 kHz and above 4 kHz, `fundamental_ratio` (80–300 Hz) |
//! | Stability | coefficient of variation of segment RMS and centroid |
//! | Shape | `kurtosis`, entropy and flatness of the averaged band profile |
//!
//! Spectra are unwindowed power spectra (`|X|²`) of the whole recording or
//! of each segment.  Ratios add `1e-10` to their denominators, so silence
//! yields finite values.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::features::zero_crossing_rate;
use crate::config::GlobalConfig;

const EPS: f64 = 1e-10;

const LOW_BAND_HZ: f64 = 1_000.0;
const HIGH_BAND_HZ: f64 = 4_000.0;
const FUNDAMENTAL_HZ: (f64, f64) = (80.0, 300.0);

/// Errors raised while summarising a recording.
#[derive(Debug, Error)]
pub enum GlobalError {
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    /// Fewer samples than stability segments.
    #[error("recording too short for whole-file analysis: {samples} samples (need {min})")]
    TooShort { samples: usize, min: usize },
}

// ---------------------------------------------------------------------------
// GlobalFeature
// ---------------------------------------------------------------------------

/// Descriptors compared against a reference recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalFeature {
    Rms,
    SpectralCentroid,
    SpectralBandwidth,
    LowBandRatio,
    MidBandRatio,
    HighBandRatio,
    RmsVariation,
    CentroidVariation,
    FundamentalRatio,
    CrestFactor,
    Kurtosis,
    BandEntropy,
    BandFlatness,
}

impl GlobalFeature {
    pub const ALL: [GlobalFeature; 13] = [
        GlobalFeature::Rms,
        GlobalFeature::SpectralCentroid,
        GlobalFeature::SpectralBandwidth,
        GlobalFeature::LowBandRatio,
        GlobalFeature::MidBandRatio,
        GlobalFeature::HighBandRatio,
        GlobalFeature::RmsVariation,
        GlobalFeature::CentroidVariation,
        GlobalFeature::FundamentalRatio,
        GlobalFeature::CrestFactor,
        GlobalFeature::Kurtosis,
        GlobalFeature::BandEntropy,
        GlobalFeature::BandFlatness,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GlobalFeature::Rms => "rms",
            GlobalFeature::SpectralCentroid => "spectral_centroid",
            GlobalFeature::SpectralBandwidth => "spectral_bandwidth",
            GlobalFeature::LowBandRatio => "low_band_ratio",
            GlobalFeature::MidBandRatio => "mid_band_ratio",
            GlobalFeature::HighBandRatio => "high_band_ratio",
            GlobalFeature::RmsVariation => "rms_variation",
            GlobalFeature::CentroidVariation => "centroid_variation",
            GlobalFeature::FundamentalRatio => "fundamental_ratio",
            GlobalFeature::CrestFactor => "crest_factor",
            GlobalFeature::Kurtosis => "kurtosis",
            GlobalFeature::BandEntropy => "band_entropy",
            GlobalFeature::BandFlatness => "band_flatness",
        }
    }

    /// Relative deviation from the reference still considered normal.
    pub fn expected_deviation(&self) -> f64 {
        match self {
            GlobalFeature::Rms => 0.3,
            GlobalFeature::SpectralCentroid => 0.2,
            GlobalFeature::SpectralBandwidth => 0.25,
            GlobalFeature::LowBandRatio | GlobalFeature::MidBandRatio => 0.15,
            GlobalFeature::HighBandRatio => 0.2,
            GlobalFeature::RmsVariation => 0.5,
            GlobalFeature::CentroidVariation => 0.4,
            GlobalFeature::FundamentalRatio => 0.2,
            GlobalFeature::CrestFactor => 0.3,
            GlobalFeature::Kurtosis => 1.0,
            GlobalFeature::BandEntropy => 0.2,
            GlobalFeature::BandFlatness => 0.3,
        }
    }
}

impl std::fmt::Display for GlobalFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// GlobalFeatures
// ---------------------------------------------------------------------------

/// Descriptors of an entire recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalFeatures {
    pub rms: f64,
    pub rms_db: f64,
    /// `max |x| − min |x|`.
    pub dynamic_range: f64,
    /// Hz.
    pub spectral_centroid: f64,
    /// Hz.
    pub spectral_bandwidth: f64,
    pub low_band_ratio: f64,
    pub mid_band_ratio: f64,
    pub high_band_ratio: f64,
    pub zero_crossing_rate: f64,
    /// Coefficient of variation of segment RMS.
    pub rms_variation: f64,
    /// Coefficient of variation of segment centroid.
    pub centroid_variation: f64,
    /// Share of power between 80 and 300 Hz.
    pub fundamental_ratio: f64,
    pub crest_factor: f64,
    /// Fourth standardised moment; 0 for a constant signal.
    pub kurtosis: f64,
    pub band_entropy: f64,
    pub band_flatness: f64,
}

impl GlobalFeatures {
    /// Summarise `samples` recorded at `sample_rate`.
    pub fn compute(
        samples: &[f32],
        sample_rate: u32,
        config: &GlobalConfig,
    ) -> Result<Self, GlobalError> {
        if sample_rate == 0 {
            return Err(GlobalError::ZeroSampleRate);
        }
        let segments = config.segments.max(1);
        let min = segments.max(2);
        if samples.len() < min {
            return Err(GlobalError::TooShort {
                samples: samples.len(),
                min,
            });
        }

        let data: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let sr = sample_rate as f64;
        let mut planner = FftPlanner::new();

        let rms = rms(&data);
        let (min_abs, max_abs) = data.iter().fold((f64::INFINITY, 0.0_f64), |(lo, hi), x| {
            (lo.min(x.abs()), hi.max(x.abs()))
        });

        let spectrum = PowerSpectrum::of(&mut planner, &data, sr);
        let total = spectrum.total();
        let centroid = spectrum.centroid();
        let low = spectrum.band(0.0, LOW_BAND_HZ);
        let mid = spectrum.band(LOW_BAND_HZ, HIGH_BAND_HZ);
        let high = spectrum.band(HIGH_BAND_HZ, f64::INFINITY);
        let bands_total = low + mid + high + EPS;

        let segment_len = data.len() / segments;
        let (segment_rms, segment_centroids): (Vec<f64>, Vec<f64>) = data
            .chunks_exact(segment_len)
            .take(segments)
            .map(|segment| {
                let centroid = PowerSpectrum::of(&mut planner, segment, sr).centroid();
                (self::rms(segment), centroid)
            })
            .unzip();

        let band_profile = band_profile(&mut planner, &data, config);

        let features = Self {
            rms,
            rms_db: 20.0 * (rms + EPS).log10(),
            dynamic_range: max_abs - min_abs,
            spectral_centroid: centroid,
            spectral_bandwidth: spectrum.bandwidth(centroid),
            low_band_ratio: low / bands_total,
            mid_band_ratio: mid / bands_total,
            high_band_ratio: high / bands_total,
            zero_crossing_rate: zero_crossing_rate(samples) as f64,
            rms_variation: variation(&segment_rms),
            centroid_variation: variation(&segment_centroids),
            fundamental_ratio: spectrum.band_inclusive(FUNDAMENTAL_HZ.0, FUNDAMENTAL_HZ.1)
                / (total + EPS),
            crest_factor: (max_abs + EPS) / (rms + EPS),
            kurtosis: kurtosis(&data),
            band_entropy: entropy(&band_profile),
            band_flatness: flatness(&band_profile),
        };
        log::debug!(
            "global: {:.2}s, rms {:.4}, centroid {:.0} Hz, crest {:.2}, kurtosis {:.2}",
            data.len() as f64 / sr,
            features.rms,
            features.spectral_centroid,
            features.crest_factor,
            features.kurtosis
        );
        Ok(features)
    }

    pub fn get(&self, feature: GlobalFeature) -> f64 {
        match feature {
            GlobalFeature::Rms => self.rms,
            GlobalFeature::SpectralCentroid => self.spectral_centroid,
            GlobalFeature::SpectralBandwidth => self.spectral_bandwidth,
            GlobalFeature::LowBandRatio => self.low_band_ratio,
            GlobalFeature::MidBandRatio => self.mid_band_ratio,
            GlobalFeature::HighBandRatio => self.high_band_ratio,
            GlobalFeature::RmsVariation => self.rms_variation,
            GlobalFeature::CentroidVariation => self.centroid_variation,
            GlobalFeature::FundamentalRatio => self.fundamental_ratio,
            GlobalFeature::CrestFactor => self.crest_factor,
            GlobalFeature::Kurtosis => self.kurtosis,
            GlobalFeature::BandEntropy => self.band_entropy,
            GlobalFeature::BandFlatness => self.band_flatness,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Unwindowed power spectrum, bins `0..=n/2`.
struct PowerSpectrum {
    power: Vec<f64>,
    bin_hz: f64,
}

impl PowerSpectrum {
    fn of(planner: &mut FftPlanner<f64>, samples: &[f64], sample_rate: f64) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                power: Vec::new(),
                bin_hz: 0.0,
            };
        }
        let mut buffer: Vec<Complex<f64>> =
            samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
        planner.plan_fft_forward(n).process(&mut buffer);
        Self {
            power: buffer[..=n / 2].iter().map(|c| c.norm_sqr()).collect(),
            bin_hz: sample_rate / n as f64,
        }
    }

    fn bins(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.power
            .iter()
            .enumerate()
            .map(|(k, &p)| (k as f64 * self.bin_hz, p))
    }

    fn total(&self) -> f64 {
        self.power.iter().sum()
    }

    fn centroid(&self) -> f64 {
        self.bins().map(|(f, p)| f * p).sum::<f64>() / (self.total() + EPS)
    }

    fn bandwidth(&self, centroid: f64) -> f64 {
        let spread: f64 = self
            .bins()
            .map(|(f, p)| (f - centroid) * (f - centroid) * p)
            .sum();
        (spread / (self.total() + EPS)).sqrt()
    }

    /// Power in `[lo, hi)`.
    fn band(&self, lo: f64, hi: f64) -> f64 {
        self.bins()
            .filter(|&(f, _)| f >= lo && f < hi)
            .map(|(_, p)| p)
            .sum()
    }

    /// Power in `[lo, hi]`.
    fn band_inclusive(&self, lo: f64, hi: f64) -> f64 {
        self.bins()
            .filter(|&(f, _)| f >= lo && f <= hi)
            .map(|(_, p)| p)
            .sum()
    }
}

fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f64>() / samples.len() as f64).sqrt()
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Population std over mean.
fn variation(values: &[f64]) -> f64 {
    let (mean, std) = mean_std(values);
    std / (mean + EPS)
}

fn kurtosis(samples: &[f64]) -> f64 {
    let (mean, std) = mean_std(samples);
    if std == 0.0 {
        return 0.0;
    }
    samples
        .iter()
        .map(|x| ((x - mean) / std).powi(4))
        .sum::<f64>()
        / samples.len() as f64
}

/// Mean power of `config.bands` equal-width bands, averaged over frames of
/// `config.band_fft_len` samples.  A recording shorter than one frame is
/// zero-padded to a single frame.
fn band_profile(planner: &mut FftPlanner<f64>, data: &[f64], config: &GlobalConfig) -> Vec<f64> {
    let fft_len = config.band_fft_len.max(2);
    let hop = config.band_hop.max(1);
    let bands = config.bands.max(1);

    let frame_count = if data.len() >= fft_len {
        (data.len() - fft_len) / hop + 1
    } else {
        1
    };

    let mut profile = vec![0.0; bands];
    let mut frame = vec![0.0; fft_len];
    for i in 0..frame_count {
        let start = i * hop;
        let end = (start + fft_len).min(data.len());
        frame.fill(0.0);
        frame[..end - start].copy_from_slice(&data[start..end]);

        let power = PowerSpectrum::of(planner, &frame, 1.0).power;
        for (j, slot) in profile.iter_mut().enumerate() {
            let lo = j * power.len() / bands;
            let hi = (j + 1) * power.len() / bands;
            if hi > lo {
                *slot += power[lo..hi].iter().sum::<f64>() / (hi - lo) as f64;
            }
        }
    }
    for slot in &mut profile {
        *slot /= frame_count as f64;
    }
    profile
}

/// Shannon entropy (nats) of the profile scaled to unit sum.
fn entropy(profile: &[f64]) -> f64 {
    let total: f64 = profile.iter().map(|p| p.abs()).sum::<f64>() + EPS;
    -profile
        .iter()
        .map(|p| {
            let q = p.abs() / total;
            q * (q + EPS).ln()
        })
        .sum::<f64>()
}

/// Geometric over arithmetic mean; 1 for a flat profile.
fn flatness(profile: &[f64]) -> f64 {
    if profile.is_empty() {
        return 0.0;
    }
    let n = profile.len() as f64;
    let values: Vec<f64> = profile.iter().map(|p| p.abs() + EPS).collect();
    let geometric = (values.iter().map(|v| v.ln()).sum::<f64>() / n).exp();
    let arithmetic = values.iter().sum::<f64>() / n;
    geometric / (arithmetic + EPS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
