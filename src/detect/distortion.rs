//! Voice distortion detection: clipping and spectral anomalies.
//!
//! Rules, first match wins:
//!
//! 1. **Clipping**: `peak_to_peak > peak_to_peak_threshold` or
//!    `peak_amplitude ≥ clip_level`.  A physical limit, so it is checked on
//!    every frame regardless of the baseline or the voice gate.
//! 2. **Spectral flux**: `flux > flux.mean + k4·flux.std`.
//! 3. **Centroid shift**: `|centroid − centroid.mean| > centroid_shift_hz`.
//! 4. **Bandwidth shift**: `|bandwidth − bandwidth.mean| > k5·bandwidth.std`.
//!
//! The flux and bandwidth margins are floored by `min_flux_margin` and
//! `min_bandwidth_shift_hz` so a perfectly steady reference (`std = 0`) does
//! not turn every deviation into an event.
//!
//! Rules 2–4 only apply to voice-active frames with `rms ≥ min_rms`.

use crate::audio::features::FeatureVector;
use crate::audio::frame::Frame;
use crate::calibration::BaselineProfile;
use crate::config::DistortionConfig;
use crate::detect::{ratio_confidence, DetectionEvent, Detector, EventKind, Reason};

#[derive(Debug, Clone)]
pub struct DistortionDetector {
    config: DistortionConfig,
}

impl DistortionDetector {
    pub fn new(config: DistortionConfig) -> Self {
        Self { config }
    }

    fn clipping(&self, features: &FeatureVector, frame: &Frame<'_>) -> Option<DetectionEvent> {
        let c = &self.config;
        if features.peak_to_peak <= c.peak_to_peak_threshold && features.peak_amplitude < c.clip_level
        {
            return None;
        }
        let confidence = features
            .peak_amplitude
            .max((features.peak_to_peak / 2.0).powf(1.5));
        Some(
            DetectionEvent::for_frame(EventKind::VoiceDistortion, frame, confidence, Reason::Clipping)
                .with_detail("peak_to_peak", features.peak_to_peak)
                .with_detail("peak_amplitude", features.peak_amplitude),
        )
    }

    fn spectral(
        &self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
    ) -> Option<DetectionEvent> {
        let c = &self.config;
        let event = |confidence, reason| {
            DetectionEvent::for_frame(EventKind::VoiceDistortion, frame, confidence, reason)
        };

        let flux_threshold = baseline.spectral_flux.mean
            + (c.flux_std_multiplier * baseline.spectral_flux.std).max(c.min_flux_margin);
        if features.spectral_flux > flux_threshold {
            let excess = if flux_threshold > 0.0 {
                features.spectral_flux / flux_threshold - 1.0
            } else {
                1.0
            };
            return Some(
                event((0.5 + excess * 0.7).min(1.0), Reason::SpectralFlux)
                    .with_detail("spectral_flux", features.spectral_flux)
                    .with_detail("threshold", flux_threshold),
            );
        }

        let centroid_shift = (features.spectral_centroid - baseline.spectral_centroid.mean).abs();
        if centroid_shift > c.centroid_shift_hz {
            return Some(
                event(
                    ratio_confidence(centroid_shift, c.centroid_shift_hz, 0.6),
                    Reason::CentroidShift,
                )
                .with_detail("spectral_centroid", features.spectral_centroid)
                .with_detail("shift_hz", centroid_shift),
            );
        }

        let bandwidth_shift =
            (features.spectral_bandwidth - baseline.spectral_bandwidth.mean).abs();
        let bandwidth_threshold = (c.bandwidth_std_multiplier * baseline.spectral_bandwidth.std)
            .max(c.min_bandwidth_shift_hz);
        if bandwidth_shift > bandwidth_threshold {
            return Some(
                event(
                    ratio_confidence(bandwidth_shift, bandwidth_threshold, 0.5),
                    Reason::BandwidthShift,
                )
                .with_detail("spectral_bandwidth", features.spectral_bandwidth)
                .with_detail("threshold", bandwidth_threshold),
            );
        }

        None
    }
}

impl Detector for DistortionDetector {
    fn kind(&self) -> EventKind {
        EventKind::VoiceDistortion
    }

    fn name(&self) -> &'static str {
        "distortion"
    }

    fn detect(
        &mut self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
        voice_active: bool,
    ) -> Option<DetectionEvent> {
        if let Some(event) = self.clipping(features, frame) {
            return Some(event);
        }
        if !voice_active || features.rms < self.config.min_rms {
            return None;
        }
        self.spectral(features, frame, baseline)
    }

    fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{baseline, frame, speech};

    fn detect(features: FeatureVector, active: bool) -> Option<DetectionEvent> {
        let mut detector = DistortionDetector::new(DistortionConfig::default());
        detector.detect(&features, &frame(0), &baseline(), active)
    }

    #[test]
    fn clean_speech_passes() {
        assert!(detect(speech(0.2), true).is_none());
    }

    #[test]
    fn full_scale_sample_is_clipping_even_when_gated() {
        let mut f = speech(0.2);
        f.peak_amplitude = 1.0;
        let event = detect(f, false).expect("clipping");
        assert_eq!(event.reason, Reason::Clipping);
        assert_eq!(event.confidence, 1.0);
        assert_eq!(event.kind, EventKind::VoiceDistortion);
    }

    #[test]
    fn large_peak_to_peak_is_clipping() {
        let mut f = speech(0.2);
        f.peak_to_peak = 1.9;
        f.peak_amplitude = 0.95;
        let event = detect(f, true).expect("clipping");
        assert_eq!(event.reason, Reason::Clipping);
        assert!(event.confidence >= 0.95);
    }

    #[test]
    fn flux_spike() {
        let mut f = speech(0.2);
        // threshold ≈ 0.05 + 3 · 0.01
        f.spectral_flux = 0.3;
        assert_eq!(detect(f, true).map(|e| e.reason), Some(Reason::SpectralFlux));
    }

    #[test]
    fn centroid_shift() {
        let mut f = speech(0.2);
        f.spectral_centroid = 1_500.0;
        assert_eq!(detect(f, true).map(|e| e.reason), Some(Reason::CentroidShift));

        f.spectral_centroid = 1_200.0;
        assert_ne!(detect(f, true).map(|e| e.reason), Some(Reason::CentroidShift));
    }

    #[test]
    fn bandwidth_shift() {
        let mut f = speech(0.2);
        // threshold = 3 · 40
        f.spectral_bandwidth = 800.0;
        assert_eq!(detect(f, true).map(|e| e.reason), Some(Reason::BandwidthShift));
    }

    #[test]
    fn steady_reference_keeps_flux_and_bandwidth_margins() {
        let steady = BaselineProfile::from_features(&vec![speech(0.2); 50], 16_000).unwrap();
        assert_eq!(steady.spectral_flux.std, 0.0);
        assert_eq!(steady.spectral_bandwidth.std, 0.0);

        let mut detector = DistortionDetector::new(DistortionConfig::default());
        let mut nudged = speech(0.2);
        nudged.spectral_flux = 0.06;
        nudged.spectral_bandwidth = 650.0;
        assert!(detector.detect(&nudged, &frame(0), &steady, true).is_none());

        let mut wide = speech(0.2);
        wide.spectral_bandwidth = 750.0;
        let event = detector
            .detect(&wide, &frame(1), &steady, true)
            .expect("bandwidth");
        assert_eq!(event.reason, Reason::BandwidthShift);
        assert_eq!(event.details["threshold"], 100.0);
    }

    #[test]
    fn spectral_rules_need_voice_and_level() {
        let mut f = speech(0.2);
        f.spectral_centroid = 3_000.0;
        assert!(detect(f, false).is_none());

        let mut quiet = speech(0.005);
        quiet.spectral_centroid = 3_000.0;
        assert!(detect(quiet, true).is_none());
    }
}
