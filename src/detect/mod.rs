//! Event detectors: per-frame rule engines behind the [`Detector`] trait.
//!
//! Each detector sees every frame in time order together with its features,
//! the calibration baseline and the voice-activity decision, and may emit a
//! raw [`DetectionEvent`].  Detectors keep their own bounded history and
//! apply the voice gate themselves:
//!
//! | Detector | Kind | Voice gate |
//! |----------|------|------------|
//! | [`NoiseDetector`] | `noise` | required |
//! | [`DropoutDetector`] | `dropout` | ignored |
//! | [`VolumeDetector`] | `volume_fluctuation` | required |
//! | [`DistortionDetector`] | `voice_distortion` | required, except clipping |
//!
//! Raw events are merged and filtered afterwards by the
//! [`EventAggregator`](crate::pipeline::EventAggregator).

pub mod distortion;
pub mod dropout;
pub mod noise;
pub mod volume;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::audio::features::FeatureVector;
use crate::audio::frame::Frame;
use crate::calibration::BaselineProfile;
use crate::config::AnalyzerConfig;

pub use distortion::DistortionDetector;
pub use dropout::{DropoutDetector, DropoutState};
pub use noise::NoiseDetector;
pub use volume::VolumeDetector;

// ---------------------------------------------------------------------------
// EventKind / Reason
// ---------------------------------------------------------------------------

/// Category of a quality-degradation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Noise,
    Dropout,
    VolumeFluctuation,
    VoiceDistortion,
}

impl EventKind {
    /// Every kind, in report order.
    pub const ALL: [EventKind; 4] = [
        EventKind::Noise,
        EventKind::Dropout,
        EventKind::VolumeFluctuation,
        EventKind::VoiceDistortion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Noise => "noise",
            EventKind::Dropout => "dropout",
            EventKind::VolumeFluctuation => "volume_fluctuation",
            EventKind::VoiceDistortion => "voice_distortion",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    HighZeroCrossingRate,
    NoiseBurst,
    TransientSpike,
    HighFrequencyNoise,
    Silence,
    Surge,
    VolumePumping,
    Clipping,
    SpectralFlux,
    CentroidShift,
    BandwidthShift,
}

// ---------------------------------------------------------------------------
// DetectionEvent
// ---------------------------------------------------------------------------

/// A time interval flagged by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub kind: EventKind,
    /// Seconds from the stream start.
    pub start_time: f64,
    pub end_time: f64,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub reason: Reason,
    /// Measured values and thresholds behind the decision.
    pub details: BTreeMap<String, f32>,
}

impl DetectionEvent {
    /// An event spanning exactly `frame`.
    pub fn for_frame(kind: EventKind, frame: &Frame<'_>, confidence: f32, reason: Reason) -> Self {
        Self::new(kind, frame.start_time, frame.end_time, confidence, reason)
    }

    /// An event over `[start_time, end_time]`; confidence is clamped to
    /// `[0, 1]`.
    pub fn new(
        kind: EventKind,
        start_time: f64,
        end_time: f64,
        confidence: f32,
        reason: Reason,
    ) -> Self {
        Self {
            kind,
            start_time,
            end_time,
            confidence: clamp_confidence(confidence),
            reason,
            details: BTreeMap::new(),
        }
    }

    /// Attach a named measurement.
    pub fn with_detail(mut self, key: &str, value: f32) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Clamp to `[0, 1]`; NaN becomes `0.0`.
pub(crate) fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// `value / threshold · scale`, or `scale` when the threshold is not
/// positive.
pub(crate) fn ratio_confidence(value: f32, threshold: f32, scale: f32) -> f32 {
    if threshold > 0.0 {
        clamp_confidence(value / threshold * scale)
    } else {
        clamp_confidence(scale)
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// A stateful per-frame rule engine.
///
/// `detect` is called once per frame, in time order.  Implementations must
/// update their history on every call, including frames on which they do not
/// fire, so that rolling statistics do not skip gated frames.
pub trait Detector: Send {
    /// Kind of every event this detector emits.
    fn kind(&self) -> EventKind;

    /// Short name used in logs and configuration errors.
    fn name(&self) -> &'static str;

    /// Whether the detector needs a calibration baseline.
    fn requires_baseline(&self) -> bool {
        true
    }

    /// Inspect one frame.
    fn detect(
        &mut self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
        voice_active: bool,
    ) -> Option<DetectionEvent>;

    /// Close any event still open at the end of the stream.
    fn finish(&mut self, _end_time: f64) -> Option<DetectionEvent> {
        None
    }

    /// Forget all history so the detector can process a new stream.
    fn reset(&mut self);
}

/// The four built-in detectors configured from `config`.
pub fn default_detectors(config: &AnalyzerConfig) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(NoiseDetector::new(config.noise.clone())),
        Box::new(DropoutDetector::new(config.dropout.clone())),
        Box::new(VolumeDetector::new(config.volume.clone())),
        Box::new(DistortionDetector::new(config.distortion.clone())),
    ]
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        let event = DetectionEvent::new(EventKind::Noise, 0.0, 0.1, 1.7, Reason::NoiseBurst);
        assert_eq!(event.confidence, 1.0);
        assert_eq!(clamp_confidence(-0.3), 0.0);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
        assert!((ratio_confidence(3.0, 2.0, 0.5) - 0.75).abs() < 1e-6);
        assert_eq!(ratio_confidence(3.0, 0.0, 0.5), 0.5);
    }

    #[test]
    fn event_for_frame_spans_the_frame() {
        let frame = testing::frame(3);
        let event = DetectionEvent::for_frame(EventKind::Dropout, &frame, 0.5, Reason::Silence)
            .with_detail("rms", 0.001);
        assert!((event.start_time - 0.03).abs() < 1e-12);
        assert!((event.duration() - 0.025).abs() < 1e-12);
        assert_eq!(event.details.get("rms"), Some(&0.001));
    }

    #[test]
    fn kinds_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventKind::VolumeFluctuation).unwrap(),
            "\"volume_fluctuation\""
        );
        assert_eq!(
            serde_json::to_string(&Reason::HighZeroCrossingRate).unwrap(),
            "\"high_zero_crossing_rate\""
        );
        assert_eq!(EventKind::VoiceDistortion.to_string(), "voice_distortion");
    }

    #[test]
    fn default_registry_covers_every_kind() {
        let detectors = default_detectors(&AnalyzerConfig::default());
        let kinds: Vec<EventKind> = detectors.iter().map(|d| d.kind()).collect();
        assert_eq!(kinds, EventKind::ALL.to_vec());
        assert!(detectors.iter().all(|d| d.requires_baseline()));
    }
}
