//! Noise detection: background hiss, sudden bursts and high-frequency noise.
//!
//! Rules are evaluated in order on voice-active frames; the first match
//! wins:
//!
//! 1. **Background noise** (off by default): `zcr > zcr.mean + k1·zcr.std`.
//! 2. **Burst**: the frame level jumps relative to the mean of the previous
//!    `history_len` frames, either in RMS (`noise_burst`) or in the 95th
//!    percentile of sub-window RMS (`transient_spike`).  The rule only
//!    applies when that history mean is above `rms.p10 ·
//!    burst_floor_p10_factor`, so speech onsets after silence do not count.
//! 3. **High-frequency noise**: `rolloff > rolloff.mean + k2·rolloff.std`,
//!    with the margin never below `min_rolloff_margin_hz`.

use crate::audio::buffer::RingBuffer;
use crate::audio::features::FeatureVector;
use crate::audio::frame::Frame;
use crate::calibration::BaselineProfile;
use crate::config::NoiseConfig;
use crate::detect::{ratio_confidence, DetectionEvent, Detector, EventKind, Reason};

/// Flags noise on voice-active frames.
#[derive(Debug, Clone)]
pub struct NoiseDetector {
    config: NoiseConfig,
    /// Features of the previous frames, oldest first.
    history: RingBuffer<FeatureVector>,
}

impl NoiseDetector {
    pub fn new(config: NoiseConfig) -> Self {
        let history = RingBuffer::new(config.history_len.max(1));
        Self { config, history }
    }

    fn evaluate(
        &self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
    ) -> Option<DetectionEvent> {
        let c = &self.config;

        if c.detect_background_noise {
            let threshold =
                baseline.zero_crossing_rate.mean + c.zcr_std_multiplier * baseline.zero_crossing_rate.std;
            if features.zero_crossing_rate > threshold {
                return Some(
                    DetectionEvent::for_frame(
                        EventKind::Noise,
                        frame,
                        ratio_confidence(features.zero_crossing_rate, threshold, 0.7),
                        Reason::HighZeroCrossingRate,
                    )
                    .with_detail("zcr", features.zero_crossing_rate)
                    .with_detail("threshold", threshold),
                );
            }
        }

        if let (Some(mean_rms), Some(mean_p95)) = (
            self.history.mean_by(|f| f.rms),
            self.history.mean_by(|f| f.rms_p95),
        ) {
            if mean_rms > baseline.rms.p10 * c.burst_floor_p10_factor {
                let rms_ratio = features.rms / mean_rms;
                if rms_ratio > c.burst_rms_ratio {
                    return Some(
                        DetectionEvent::for_frame(
                            EventKind::Noise,
                            frame,
                            ratio_confidence(rms_ratio, c.burst_rms_ratio, 0.6),
                            Reason::NoiseBurst,
                        )
                        .with_detail("rms", features.rms)
                        .with_detail("history_rms", mean_rms)
                        .with_detail("ratio", rms_ratio),
                    );
                }

                if mean_p95 > 0.0 {
                    let p95_ratio = features.rms_p95 / mean_p95;
                    if p95_ratio > c.burst_p95_ratio {
                        return Some(
                            DetectionEvent::for_frame(
                                EventKind::Noise,
                                frame,
                                ratio_confidence(p95_ratio, c.burst_p95_ratio, 0.6),
                                Reason::TransientSpike,
                            )
                            .with_detail("rms_p95", features.rms_p95)
                            .with_detail("history_rms_p95", mean_p95)
                            .with_detail("ratio", p95_ratio),
                        );
                    }
                }
            }
        }

        let threshold = baseline.spectral_rolloff.mean
            + (c.rolloff_std_multiplier * baseline.spectral_rolloff.std)
                .max(c.min_rolloff_margin_hz);
        if features.spectral_rolloff > threshold {
            let excess = if threshold > 0.0 {
                features.spectral_rolloff / threshold - 1.0
            } else {
                1.0
            };
            return Some(
                DetectionEvent::for_frame(
                    EventKind::Noise,
                    frame,
                    (0.5 + excess * 0.5).min(1.0),
                    Reason::HighFrequencyNoise,
                )
                .with_detail("spectral_rolloff", features.spectral_rolloff)
                .with_detail("threshold", threshold),
            );
        }

        None
    }
}

impl Detector for NoiseDetector {
    fn kind(&self) -> EventKind {
        EventKind::Noise
    }

    fn name(&self) -> &'static str {
        "noise"
    }

    fn detect(
        &mut self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
        voice_active: bool,
    ) -> Option<DetectionEvent> {
        let event = if voice_active {
            self.evaluate(features, frame, baseline)
        } else {
            None
        };
        self.history.push(*features);
        event
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
