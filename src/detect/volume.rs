//! Volume fluctuation detection: rapid level reversals (AGC pumping).
//!
//! With the last three frame RMS values `r[t-2], r[t-1], r[t]`:
//!
//! ```text
//! d1 = r[t-1] − r[t-2]
//! d2 = r[t]   − r[t-1]
//! ```
//!
//! a reversal is `d1 · d2 < 0`.  It fires on a voice-active frame when both
//! steps exceed `max(rms.std · k3, min_reversal_rms)`.  Monotonic ramps and
//! steady tones never fire.

use crate::audio::buffer::RingBuffer;
use crate::audio::features::FeatureVector;
use crate::audio::frame::Frame;
use crate::calibration::BaselineProfile;
use crate::config::VolumeConfig;
use crate::detect::{ratio_confidence, DetectionEvent, Detector, EventKind, Reason};

#[derive(Debug, Clone)]
pub struct VolumeDetector {
    config: VolumeConfig,
    /// RMS of the two previous frames.
    levels: RingBuffer<f32>,
}

impl VolumeDetector {
    pub fn new(config: VolumeConfig) -> Self {
        Self {
            config,
            levels: RingBuffer::new(2),
        }
    }

    /// Minimum step size on both sides of a reversal.
    pub fn threshold(&self, baseline: &BaselineProfile) -> f32 {
        (baseline.rms.std * self.config.reversal_std_multiplier).max(self.config.min_reversal_rms)
    }
}

impl Detector for VolumeDetector {
    fn kind(&self) -> EventKind {
        EventKind::VolumeFluctuation
    }

    fn name(&self) -> &'static str {
        "volume"
    }

    fn detect(
        &mut self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
        voice_active: bool,
    ) -> Option<DetectionEvent> {
        let event = match (self.levels.nth_back(1), self.levels.nth_back(0)) {
            (Some(r2), Some(r1)) if voice_active => {
                let d1 = r1 - r2;
                let d2 = features.rms - r1;
                let step = d1.abs().min(d2.abs());
                let threshold = self.threshold(baseline);

                (d1 * d2 < 0.0 && step > threshold).then(|| {
                    DetectionEvent::for_frame(
                        EventKind::VolumeFluctuation,
                        frame,
                        ratio_confidence(step, threshold, 0.5),
                        Reason::VolumePumping,
                    )
                    .with_detail("d1", d1)
                    .with_detail("d2", d2)
                    .with_detail("threshold", threshold)
                })
            }
            _ => None,
        };

        self.levels.push(features.rms);
        event
    }

    fn reset(&mut self) {
        self.levels.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
