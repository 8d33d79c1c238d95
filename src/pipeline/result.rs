//! Final analysis output and its JSON report form.
//!
//! The report groups events by kind:
//!
//! ```json
//! {
//!   "total_duration": 10.0,
//!   "frame_count": 998,
//!   "noise": { "count": 1, "events": [
//!     { "start": 1.99, "end": 2.515, "confidence": 1.0,
//!       "reason": "high_frequency_noise", "details": { "spectral_rolloff": 7440.0 } }
//!   ] },
//!   "dropout": { "count": 0, "events": [] },
//!   "volume_fluctuation": { "count": 0, "events": [] },
//!   "voice_distortion": { "count": 0, "events": [] }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detect::{DetectionEvent, EventKind, Reason};
use crate::pipeline::global::GlobalAnalysis;

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// Reported events of one analysis, ordered by kind then start time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    events: Vec<DetectionEvent>,
    total_duration: f64,
    frame_count: usize,
}

impl AnalysisResult {
    pub fn new(mut events: Vec<DetectionEvent>, total_duration: f64, frame_count: usize) -> Self {
        events.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then(a.start_time.total_cmp(&b.start_time))
        });
        Self {
            events,
            total_duration,
            frame_count,
        }
    }

    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }

    /// Events of one kind, in start order.
    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &DetectionEvent> + '_ {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events_of(kind).count()
    }

    /// Duration of the analyzed waveform in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_clean(&self) -> bool {
        self.events.is_empty()
    }

    /// The serializable report keyed by kind.
    pub fn to_report(&self) -> Report {
        let group = |kind| {
            let events: Vec<ReportEvent> = self
                .events_of(kind)
                .map(|e| ReportEvent {
                    start: e.start_time,
                    end: e.end_time,
                    confidence: e.confidence,
                    reason: e.reason,
                    details: e.details.clone(),
                })
                .collect();
            KindReport {
                count: events.len(),
                events,
            }
        };
        Report {
            total_duration: self.total_duration,
            frame_count: self.frame_count,
            noise: group(EventKind::Noise),
            dropout: group(EventKind::Dropout),
            volume_fluctuation: group(EventKind::VolumeFluctuation),
            voice_distortion: group(EventKind::VoiceDistortion),
            global: None,
        }
    }

    /// Pretty-printed JSON report.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_report())
    }
}

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}s analyzed ({} frames):",
            self.total_duration, self.frame_count
        )?;
        for kind in EventKind::ALL {
            write!(f, " {}={}", kind, self.count(kind))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// JSON form of an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total_duration: f64,
    pub frame_count: usize,
    pub noise: KindReport,
    pub dropout: KindReport,
    pub volume_fluctuation: KindReport,
    pub voice_distortion: KindReport,
    /// Whole-recording verdict, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindReport {
    pub count: usize,
    pub events: Vec<ReportEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEvent {
    pub start: f64,
    pub end: f64,
    pub confidence: f32,
    pub reason: Reason,
    pub details: BTreeMap<String, f32>,
}

impl Report {
    pub fn kind(&self, kind: EventKind) -> &KindReport {
        match kind {
            EventKind::Noise => &self.noise,
            EventKind::Dropout => &self.dropout,
            EventKind::VolumeFluctuation => &self.volume_fluctuation,
            EventKind::VoiceDistortion => &self.voice_distortion,
        }
    }

    /// Attach a whole-recording verdict.
    pub fn with_global(mut self, global: GlobalAnalysis) -> Self {
        self.global = Some(global);
        self
    }

    /// Rebuild the result the report was produced from.  The whole-recording
    /// verdict is not part of it.
    pub fn into_result(self) -> AnalysisResult {
        let (total_duration, frame_count) = (self.total_duration, self.frame_count);
        let events = [
            (EventKind::Noise, self.noise),
            (EventKind::Dropout, self.dropout),
            (EventKind::VolumeFluctuation, self.volume_fluctuation),
            (EventKind::VoiceDistortion, self.voice_distortion),
        ]
        .into_iter()
        .flat_map(|(kind, group)| {
            group.events.into_iter().map(move |e| DetectionEvent {
                kind,
                start_time: e.start,
                end_time: e.end,
                confidence: e.confidence,
                reason: e.reason,
                details: e.details,
            })
        })
        .collect();
        AnalysisResult::new(events, total_duration, frame_count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::global::GlobalFeatures;
    use crate::config::GlobalConfig;

    fn sample() -> AnalysisResult {
        AnalysisResult::new(
            vec![
                DetectionEvent::new(EventKind::Dropout, 5.0, 5.195, 0.8, Reason::Silence)
                    .with_detail("min_rms", 0.0),
                DetectionEvent::new(EventKind::Noise, 2.5, 2.7, 0.6, Reason::NoiseBurst),
                DetectionEvent::new(
                    EventKind::Noise,
                    1.99,
                    2.3,
                    1.0,
                    Reason::HighFrequencyNoise,
                ),
            ],
            10.0,
            998,
        )
    }

    #[test]
    fn events_are_ordered_by_kind_then_start() {
        let result = sample();
        let order: Vec<(EventKind, f64)> = result
            .events()
            .iter()
            .map(|e| (e.kind, e.start_time))
            .collect();
        assert_eq!(
            order,
            vec![
                (EventKind::Noise, 1.99),
                (EventKind::Noise, 2.5),
                (EventKind::Dropout, 5.0)
            ]
        );
        assert_eq!(result.count(EventKind::Noise), 2);
        assert_eq!(result.count(EventKind::VoiceDistortion), 0);
        assert!(!result.is_clean());
    }

    #[test]
    fn report_is_keyed_by_kind() {
        let json: serde_json::Value =
            serde_json::from_str(&sample().to_json_string().unwrap()).unwrap();
        assert_eq!(json["noise"]["count"], 2);
        assert_eq!(json["dropout"]["events"][0]["reason"], "silence");
        assert_eq!(json["dropout"]["events"][0]["start"], 5.0);
        assert_eq!(json["volume_fluctuation"]["count"], 0);
        assert!(json["voice_distortion"]["events"].as_array().unwrap().is_empty());
    }

    #[test]
    fn report_round_trips() {
        let result = sample();
        let json = result.to_json_string().unwrap();
        let report: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(report, result.to_report());
        assert_eq!(report.kind(EventKind::Noise).count, 2);
        assert_eq!(report.into_result(), result);
    }

    #[test]
    fn global_verdict_is_optional_in_the_report() {
        let plain = sample().to_json_string().unwrap();
        assert!(!plain.contains("\"global\""));

        let features = GlobalFeatures {
            crest_factor: 5.0,
            kurtosis: 3.0,
            fundamental_ratio: 0.4,
            band_flatness: 0.5,
            ..Default::default()
        };
        let report = sample()
            .to_report()
            .with_global(GlobalAnalysis::new(features, None, &GlobalConfig::default()));
        let json = serde_json::to_string(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.into_result(), sample());
    }

    #[test]
    fn display_summarizes_counts() {
        let text = sample().to_string();
        assert!(text.starts_with("10.00s analyzed (998 frames):"));
        assert!(text.contains("noise=2"));
        assert!(text.contains("voice_distortion=0"));
    }
}
