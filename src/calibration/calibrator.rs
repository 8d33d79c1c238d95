//! Build a [`BaselineProfile`] from a reference waveform.

use thiserror::Error;

use crate::audio::features::{FeatureExtractor, FeatureVector};
use crate::audio::frame::{FrameError, FrameSource};
use crate::audio::global::{GlobalError, GlobalFeatures};
use crate::calibration::BaselineProfile;
use crate::config::AnalyzerConfig;

/// Errors raised while calibrating.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// No frames could be extracted from the reference.
    #[error("calibration reference produced no frames")]
    Empty,

    /// The reference is shorter than `calibration.min_duration_secs`.
    #[error("calibration reference too short: {got_secs:.2}s (need at least {min_secs:.2}s)")]
    TooShort { got_secs: f64, min_secs: f64 },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Global(#[from] GlobalError),
}

/// Frames and extracts a reference recording with the analysis settings and
/// aggregates the result.
///
/// # Example
///
/// ```rust
/// use voice_quality::calibration::{CalibrationError, Calibrator};
/// use voice_quality::config::AnalyzerConfig;
///
/// let calibrator = Calibrator::new(&AnalyzerConfig::default());
/// let two_seconds = vec![0.1_f32; 32_000];
/// assert!(matches!(
///     calibrator.calibrate(&two_seconds, 16_000),
///     Err(CalibrationError::TooShort { .. })
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: AnalyzerConfig,
}

impl Calibrator {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Extract the feature vectors of `samples` as the analyzer would.
    pub fn extract_features(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<FeatureVector>, CalibrationError> {
        let source = FrameSource::from_config(samples, sample_rate, &self.config.frame)?;
        let mut extractor = FeatureExtractor::new(self.config.features.clone());
        Ok(source.frames().map(|frame| extractor.extract(&frame)).collect())
    }

    /// Compute the baseline profile of a reference recording.
    pub fn calibrate(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<BaselineProfile, CalibrationError> {
        if sample_rate == 0 {
            return Err(FrameError::ZeroSampleRate.into());
        }
        let duration = samples.len() as f64 / sample_rate as f64;
        let min_secs = self.config.calibration.min_duration_secs;
        if duration < min_secs {
            return Err(CalibrationError::TooShort {
                got_secs: duration,
                min_secs,
            });
        }

        let features = self.extract_features(samples, sample_rate)?;
        let mut profile = BaselineProfile::from_features(&features, sample_rate)?;
        profile.duration_secs = duration;
        profile.global = Some(GlobalFeatures::compute(
            samples,
            sample_rate,
            &self.config.global,
        )?);

        log::info!(
            "calibration: {:.2}s, {} frames, rms mean {:.4} (p10 {:.4}), centroid mean {:.0} Hz",
            duration,
            profile.frame_count,
            profile.rms.mean,
            profile.rms.p10,
            profile.spectral_centroid.mean
        );
        Ok(profile)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
