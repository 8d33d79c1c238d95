//! Dropout detection: signal collapsing to near-silence, or surging towards
//! full scale, inside an otherwise active stream.
//!
//! ## Silence
//!
//! A frame is silent when `rms < max(rms.p10 · c, silence_rms_floor)` and
//! its zero-crossing rate is below `zcr_threshold`.  The detector tracks a
//! [`DropoutState`]:
//!
//! ```text
//!            silent                       !silent
//! Speech ───────────▶ Silence{since} ───────────────▶ Speech
//!                                   emit [since, until]
//! ```
//!
//! `until` is the end of the last silent frame.  The detector starts in
//! leading silence (`since == None`), so a stream that begins silent reports
//! nothing until speech has been seen once.
//!
//! ## Surge
//!
//! Independently, a frame whose RMS exceeds `spike_ratio` times the mean of
//! the previous `history_len` frames (with that mean above the silence
//! threshold) opens a `surge` event, reported once the condition clears.
//!
//! Both rules ignore voice activity: a dropout is precisely the moment the
//! voice gate would close.

use crate::audio::buffer::RingBuffer;
use crate::audio::features::FeatureVector;
use crate::audio::frame::Frame;
use crate::calibration::BaselineProfile;
use crate::config::DropoutConfig;
use crate::detect::{ratio_confidence, DetectionEvent, Detector, EventKind, Reason};

/// Silence tracking state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropoutState {
    Speech,
    Silence {
        /// Start of the silent run; `None` for silence before any speech.
        since: Option<f64>,
        /// End of the last silent frame.
        until: f64,
        /// Quietest frame RMS in the run.
        min_rms: f32,
    },
}

impl DropoutState {
    fn leading() -> Self {
        DropoutState::Silence {
            since: None,
            until: 0.0,
            min_rms: f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Surge {
    since: f64,
    until: f64,
    peak_ratio: f32,
}

/// Flags dropouts and level surges regardless of voice activity.
#[derive(Debug, Clone)]
pub struct DropoutDetector {
    config: DropoutConfig,
    state: DropoutState,
    surge: Option<Surge>,
    /// Silence threshold of the most recent frame.
    threshold: f32,
    /// RMS of the previous frames.
    history: RingBuffer<f32>,
}

impl DropoutDetector {
    pub fn new(config: DropoutConfig) -> Self {
        let history = RingBuffer::new(config.history_len.max(1));
        Self {
            config,
            state: DropoutState::leading(),
            surge: None,
            threshold: 0.0,
            history,
        }
    }

    /// Current silence tracking state.
    pub fn state(&self) -> DropoutState {
        self.state
    }

    /// RMS below which a frame may count as silent.
    pub fn silence_threshold(&self, baseline: &BaselineProfile) -> f32 {
        (baseline.rms.p10 * self.config.silence_p10_factor).max(self.config.silence_rms_floor)
    }

    fn silence_event(&self, since: f64, until: f64, min_rms: f32, threshold: f32) -> DetectionEvent {
        let confidence = if min_rms < threshold * 0.5 { 0.8 } else { 0.5 };
        DetectionEvent::new(EventKind::Dropout, since, until, confidence, Reason::Silence)
            .with_detail("min_rms", min_rms)
            .with_detail("threshold", threshold)
    }

    fn surge_event(&self, surge: Surge) -> DetectionEvent {
        DetectionEvent::new(
            EventKind::Dropout,
            surge.since,
            surge.until,
            ratio_confidence(surge.peak_ratio, self.config.spike_ratio, 0.6),
            Reason::Surge,
        )
        .with_detail("peak_ratio", surge.peak_ratio)
    }

    /// Advance the silence state machine; returns a closed dropout.
    fn track_silence(
        &mut self,
        silent: bool,
        rms: f32,
        frame: &Frame<'_>,
        threshold: f32,
    ) -> Option<DetectionEvent> {
        match (self.state, silent) {
            (DropoutState::Speech, true) => {
                self.state = DropoutState::Silence {
                    since: Some(frame.start_time),
                    until: frame.end_time,
                    min_rms: rms,
                };
                None
            }
            (DropoutState::Silence { since, min_rms, .. }, true) => {
                self.state = DropoutState::Silence {
                    since,
                    until: frame.end_time,
                    min_rms: min_rms.min(rms),
                };
                None
            }
            (DropoutState::Silence { since, until, min_rms }, false) => {
                self.state = DropoutState::Speech;
                since.map(|since| self.silence_event(since, until, min_rms, threshold))
            }
            (DropoutState::Speech, false) => None,
        }
    }

    /// Advance the surge rule; returns a surge that just cleared.
    fn track_surge(
        &mut self,
        rms: f32,
        frame: &Frame<'_>,
        threshold: f32,
    ) -> Option<DetectionEvent> {
        let ratio = match self.history.mean_by(|r| r) {
            Some(mean) if mean > threshold => rms / mean,
            _ => 0.0,
        };

        if ratio > self.config.spike_ratio {
            let surge = match self.surge {
                Some(open) => Surge {
                    until: frame.end_time,
                    peak_ratio: open.peak_ratio.max(ratio),
                    ..open
                },
                None => Surge {
                    since: frame.start_time,
                    until: frame.end_time,
                    peak_ratio: ratio,
                },
            };
            self.surge = Some(surge);
            None
        } else {
            self.surge.take().map(|surge| self.surge_event(surge))
        }
    }
}

impl Detector for DropoutDetector {
    fn kind(&self) -> EventKind {
        EventKind::Dropout
    }

    fn name(&self) -> &'static str {
        "dropout"
    }

    fn detect(
        &mut self,
        features: &FeatureVector,
        frame: &Frame<'_>,
        baseline: &BaselineProfile,
        _voice_active: bool,
    ) -> Option<DetectionEvent> {
        let threshold = self.silence_threshold(baseline);
        self.threshold = threshold;
        let silent =
            features.rms < threshold && features.zero_crossing_rate < self.config.zcr_threshold;

        // A silent frame always clears the surge condition, and a silent run
        // only closes on a loud frame, so at most one of these emits.
        let dropout = self.track_silence(silent, features.rms, frame, threshold);
        let surge = self.track_surge(features.rms, frame, threshold);

        self.history.push(features.rms);
        dropout.or(surge)
    }

    fn finish(&mut self, end_time: f64) -> Option<DetectionEvent> {
        if let Some(surge) = self.surge.take() {
            return Some(self.surge_event(Surge {
                until: surge.until.min(end_time),
                ..surge
            }));
        }
        match std::mem::replace(&mut self.state, DropoutState::leading()) {
            DropoutState::Silence {
                since: Some(since),
                until,
                min_rms,
            } => Some(self.silence_event(since, until.min(end_time), min_rms, self.threshold)),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.state = DropoutState::leading();
        self.surge = None;
        self.history.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
