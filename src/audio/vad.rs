//! Feature-based Voice Activity Detection (VAD).
//!
//! [`VoiceActivityGate`] decides per frame whether speech is present so that
//! detectors do not flag pauses or background as degradations.
//!
//! ## Algorithm
//!
//! Three range checks vote on every frame:
//!
//! * RMS within `(rms_floor, max_rms)`, where `rms_floor =
//!   min(min_rms, baseline.rms.p10 · rms_p10_factor)` so that quiet devices
//!   are not gated out entirely;
//! * spectral centroid within `(min_centroid_hz, max_centroid_hz)`;
//! * zero-crossing rate within `(min_zcr, max_zcr)`.
//!
//! The frame is voice-active when at least `min_votes` checks pass.  With
//! the gate disabled every frame is active.

use crate::audio::features::FeatureVector;
use crate::calibration::BaselineProfile;
use crate::config::VadConfig;

// ---------------------------------------------------------------------------
// VoiceActivityGate
// ---------------------------------------------------------------------------

/// Per-frame speech/non-speech vote.
///
/// # Example
///
/// ```rust
/// use voice_quality::audio::{FeatureVector, VoiceActivityGate};
/// use voice_quality::calibration::BaselineProfile;
/// use voice_quality::config::VadConfig;
///
/// let reference = vec![
///     FeatureVector { rms: 0.2, spectral_centroid: 600.0, zero_crossing_rate: 0.06, ..Default::default() };
///     10
/// ];
/// let baseline = BaselineProfile::from_features(&reference, 16_000).unwrap();
/// let gate = VoiceActivityGate::new(VadConfig::default());
///
/// assert!(gate.is_active(&reference[0], &baseline));
/// assert!(!gate.is_active(&FeatureVector::default(), &baseline));
/// ```
#[derive(Debug, Clone)]
pub struct VoiceActivityGate {
    config: VadConfig,
}

impl VoiceActivityGate {
    /// Create a gate with the given bounds.
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    /// Whether the gate is enabled at all.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Lower RMS bound used for `baseline`.
    pub fn rms_floor(&self, baseline: &BaselineProfile) -> f32 {
        self.config
            .min_rms
            .min(baseline.rms.p10 * self.config.rms_p10_factor)
    }

    /// Number of range checks `features` passes (0–3).
    pub fn votes(&self, features: &FeatureVector, baseline: &BaselineProfile) -> usize {
        let c = &self.config;
        let rms_ok = features.rms > self.rms_floor(baseline) && features.rms < c.max_rms;
        let centroid_ok = features.spectral_centroid > c.min_centroid_hz
            && features.spectral_centroid < c.max_centroid_hz;
        let zcr_ok =
            features.zero_crossing_rate > c.min_zcr && features.zero_crossing_rate < c.max_zcr;

        [rms_ok, centroid_ok, zcr_ok].iter().filter(|&&ok| ok).count()
    }

    /// Returns `true` when the frame is classified as speech.
    pub fn is_active(&self, features: &FeatureVector, baseline: &BaselineProfile) -> bool {
        if !self.config.enabled {
            return true;
        }
        self.votes(features, baseline) >= self.config.min_votes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn speech() -> FeatureVector {
        FeatureVector {
            rms: 0.2,
            zero_crossing_rate: 0.06,
            spectral_centroid: 600.0,
            ..Default::default()
        }
    }

    fn baseline_with_rms(rms: f32) -> BaselineProfile {
        let frames = vec![FeatureVector { rms, ..speech() }; 4];
        BaselineProfile::from_features(&frames, 16_000).unwrap()
    }

    #[test]
    fn speech_frame_is_active() {
        let gate = VoiceActivityGate::new(VadConfig::default());
        let baseline = baseline_with_rms(0.2);
        assert_eq!(gate.votes(&speech(), &baseline), 3);
        assert!(gate.is_active(&speech(), &baseline));
    }

    #[test]
    fn silence_is_inactive() {
        let gate = VoiceActivityGate::new(VadConfig::default());
        let baseline = baseline_with_rms(0.2);
        assert_eq!(gate.votes(&FeatureVector::default(), &baseline), 0);
        assert!(!gate.is_active(&FeatureVector::default(), &baseline));
    }

    #[test]
    fn two_of_three_votes_suffice() {
        let gate = VoiceActivityGate::new(VadConfig::default());
        let baseline = baseline_with_rms(0.2);
        // Hiss: loud and bright, zcr out of range.
        let hiss = FeatureVector {
            zero_crossing_rate: 0.6,
            ..speech()
        };
        assert_eq!(gate.votes(&hiss, &baseline), 2);
        assert!(gate.is_active(&hiss, &baseline));

        let only_level = FeatureVector {
            zero_crossing_rate: 0.6,
            spectral_centroid: 6_000.0,
            ..speech()
        };
        assert!(!gate.is_active(&only_level, &baseline));
    }

    #[test]
    fn quiet_device_lowers_the_floor() {
        let gate = VoiceActivityGate::new(VadConfig::default());
        let quiet = baseline_with_rms(0.01);
        assert!((gate.rms_floor(&quiet) - 0.005).abs() < 1e-6);

        let loud = baseline_with_rms(0.3);
        assert!((gate.rms_floor(&loud) - 0.02).abs() < 1e-6);

        let soft_speech = FeatureVector {
            rms: 0.01,
            ..speech()
        };
        assert_eq!(gate.votes(&soft_speech, &quiet), 3);
        assert_eq!(gate.votes(&soft_speech, &loud), 2);
    }

    #[test]
    fn disabled_gate_passes_everything() {
        let gate = VoiceActivityGate::new(VadConfig {
            enabled: false,
            ..Default::default()
        });
        let baseline = baseline_with_rms(0.2);
        assert!(!gate.enabled());
        assert!(gate.is_active(&FeatureVector::default(), &baseline));
    }
}
