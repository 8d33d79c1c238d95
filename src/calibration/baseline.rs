//! Baseline profile: per-feature statistics of a reference recording.
//!
//! Every detector threshold is expressed relative to these statistics so the
//! same configuration adapts to different microphones and rooms.  A profile
//! is immutable once built and is shared as `Arc<BaselineProfile>`.
//!
//! Profiles persist as pretty-printed JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::features::{percentile, Feature, FeatureVector};
use crate::audio::global::GlobalFeatures;
use crate::calibration::CalibrationError;

/// Errors raised while reading or writing a profile file.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// FeatureStats
// ---------------------------------------------------------------------------

/// Summary statistics of one feature over the reference frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f32,
    /// Population standard deviation.
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub p10: f32,
    pub p50: f32,
    pub p90: f32,
    pub p95: f32,
}

impl FeatureStats {
    /// Statistics of `values`; all zero for an empty slice.
    pub fn from_values(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Self {
            mean: mean as f32,
            std: variance.sqrt() as f32,
            min,
            max,
            p10: percentile(values, 10.0),
            p50: percentile(values, 50.0),
            p90: percentile(values, 90.0),
            p95: percentile(values, 95.0),
        }
    }
}

// ---------------------------------------------------------------------------
// BaselineProfile
// ---------------------------------------------------------------------------

/// Feature statistics of a "normal" reference recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub sample_rate: u32,
    pub frame_count: usize,
    pub duration_secs: f64,

    pub rms: FeatureStats,
    pub zero_crossing_rate: FeatureStats,
    pub spectral_centroid: FeatureStats,
    pub spectral_bandwidth: FeatureStats,
    /// Excludes the first frame, which has no predecessor.
    pub spectral_flux: FeatureStats,
    pub peak_to_peak: FeatureStats,
    pub spectral_rolloff: FeatureStats,
    pub rms_p95: FeatureStats,
    pub peak_amplitude: FeatureStats,

    /// Whole-recording descriptors of the reference.  Absent in profiles
    /// built from feature vectors alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalFeatures>,
}

impl BaselineProfile {
    /// Aggregate the feature vectors of a reference recording.
    ///
    /// `duration_secs` is left at zero; the [`Calibrator`](super::Calibrator)
    /// fills in the waveform length.
    pub fn from_features(
        features: &[FeatureVector],
        sample_rate: u32,
    ) -> Result<Self, CalibrationError> {
        if features.is_empty() {
            return Err(CalibrationError::Empty);
        }

        let stats = |feature: Feature| {
            let skip = usize::from(feature == Feature::SpectralFlux && features.len() > 1);
            let values: Vec<f32> = features[skip..].iter().map(|f| f.get(feature)).collect();
            FeatureStats::from_values(&values)
        };

        Ok(Self {
            sample_rate,
            frame_count: features.len(),
            duration_secs: 0.0,
            rms: stats(Feature::Rms),
            zero_crossing_rate: stats(Feature::ZeroCrossingRate),
            spectral_centroid: stats(Feature::SpectralCentroid),
            spectral_bandwidth: stats(Feature::SpectralBandwidth),
            spectral_flux: stats(Feature::SpectralFlux),
            peak_to_peak: stats(Feature::PeakToPeak),
            spectral_rolloff: stats(Feature::SpectralRolloff),
            rms_p95: stats(Feature::RmsP95),
            peak_amplitude: stats(Feature::PeakAmplitude),
            global: None,
        })
    }

    /// A profile with every statistic at zero, for analyzers whose
    /// detectors need no calibration.  `sample_rate` 0 matches any input.
    pub fn neutral() -> Self {
        Self {
            sample_rate: 0,
            frame_count: 0,
            duration_secs: 0.0,
            rms: FeatureStats::default(),
            zero_crossing_rate: FeatureStats::default(),
            spectral_centroid: FeatureStats::default(),
            spectral_bandwidth: FeatureStats::default(),
            spectral_flux: FeatureStats::default(),
            peak_to_peak: FeatureStats::default(),
            spectral_rolloff: FeatureStats::default(),
            rms_p95: FeatureStats::default(),
            peak_amplitude: FeatureStats::default(),
            global: None,
        }
    }

    /// Statistics of `feature`.
    pub fn stats(&self, feature: Feature) -> &FeatureStats {
        match feature {
            Feature::Rms => &self.rms,
            Feature::ZeroCrossingRate => &self.zero_crossing_rate,
            Feature::SpectralCentroid => &self.spectral_centroid,
            Feature::SpectralBandwidth => &self.spectral_bandwidth,
            Feature::SpectralFlux => &self.spectral_flux,
            Feature::PeakToPeak => &self.peak_to_peak,
            Feature::SpectralRolloff => &self.spectral_rolloff,
            Feature::RmsP95 => &self.rms_p95,
            Feature::PeakAmplitude => &self.peak_amplitude,
        }
    }

    /// Read a profile written by [`save_to`](Self::save_to).
    pub fn load_from(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&content)?;
        log::debug!(
            "baseline: loaded {} ({} frames @ {} Hz)",
            path.display(),
            profile.frame_count,
            profile.sample_rate
        );
        Ok(profile)
    }

    /// Write the profile as JSON, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ProfileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
