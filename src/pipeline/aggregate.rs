//! Raw trigger post-processing: merge close events, drop short ones.
//!
//! Detectors emit one event per triggering frame (or per open/close pair).
//! [`EventAggregator::finalize`] turns that stream into reported events, per
//! kind:
//!
//! 1. **Merge**: sorted by start time, `next` is folded into `current` when
//!    `next.start − current.end < merge_gap`.  The merged event keeps the
//!    first reason, the maximum end and confidence, and the union of
//!    details (later values win).
//! 2. **Filter**: events shorter than `min_duration[kind]` are dropped.
//!
//! Both passes are pure, and finalizing an already-final list is a no-op.

use std::collections::BTreeMap;

use crate::config::{EventConfig, MinDurations};
use crate::detect::{DetectionEvent, EventKind};
use crate::pipeline::result::AnalysisResult;

/// Merge events closer than `gap` seconds.
///
/// Events are compared only with events of the same kind; the output is
/// ordered by kind, then start time.
pub fn merge_events(events: Vec<DetectionEvent>, gap: f64) -> Vec<DetectionEvent> {
    let mut by_kind: BTreeMap<EventKind, Vec<DetectionEvent>> = BTreeMap::new();
    for event in events {
        by_kind.entry(event.kind).or_default().push(event);
    }

    let mut merged = Vec::new();
    for (_, mut group) in by_kind {
        group.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut iter = group.into_iter();
        let Some(mut current) = iter.next() else {
            continue;
        };
        for next in iter {
            if next.start_time - current.end_time < gap {
                current.end_time = current.end_time.max(next.end_time);
                current.confidence = current.confidence.max(next.confidence);
                current.details.extend(next.details);
            } else {
                merged.push(std::mem::replace(&mut current, next));
            }
        }
        merged.push(current);
    }
    merged
}

/// Keep events lasting at least their kind's minimum duration.
pub fn filter_short_events(
    events: Vec<DetectionEvent>,
    min_duration: &MinDurations,
) -> Vec<DetectionEvent> {
    events
        .into_iter()
        .filter(|e| e.duration() >= min_duration.for_kind(e.kind))
        .collect()
}

/// Applies [`merge_events`] and [`filter_short_events`] with configured
/// thresholds.
#[derive(Debug, Clone)]
pub struct EventAggregator {
    config: EventConfig,
}

impl EventAggregator {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Merge and filter `raw` events into the final result.
    pub fn finalize(
        &self,
        raw: Vec<DetectionEvent>,
        total_duration: f64,
        frame_count: usize,
    ) -> AnalysisResult {
        let raw_count = raw.len();
        let merged = merge_events(raw, self.config.merge_gap_secs);
        let merged_count = merged.len();
        let events = filter_short_events(merged, &self.config.min_duration);

        log::debug!(
            "aggregate: {raw_count} raw → {merged_count} merged → {} reported",
            events.len()
        );
        AnalysisResult::new(events, total_duration, frame_count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Reason;

    const EPS: f64 = 1e-6;

    fn event(kind: EventKind, start: f64, end: f64) -> DetectionEvent {
        DetectionEvent::new(kind, start, end, 0.5, Reason::NoiseBurst)
    }

    #[test]
    fn merges_below_gap_only() {
        let gap = 0.15;
        let close = vec![
            event(EventKind::Noise, 0.0, 1.0),
            event(EventKind::Noise, 1.0 + gap - EPS, 1.5),
        ];
        let merged = merge_events(close, gap);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_time, 0.0);
        assert_eq!(merged[0].end_time, 1.5);

        let apart = vec![
            event(EventKind::Noise, 0.0, 1.0),
            event(EventKind::Noise, 1.0 + gap + EPS, 1.5),
        ];
        assert_eq!(merge_events(apart, gap).len(), 2);
    }

    #[test]
    fn merge_keeps_max_confidence_first_reason_and_latest_details() {
        let first = DetectionEvent::new(EventKind::Noise, 0.0, 0.1, 0.4, Reason::NoiseBurst)
            .with_detail("rms", 0.1)
            .with_detail("ratio", 2.5);
        let second =
            DetectionEvent::new(EventKind::Noise, 0.05, 0.08, 0.9, Reason::HighFrequencyNoise)
                .with_detail("rms", 0.3);

        let merged = merge_events(vec![second, first], 0.15);
        assert_eq!(merged.len(), 1);
        let e = &merged[0];
        assert_eq!(e.reason, Reason::NoiseBurst);
        assert_eq!(e.end_time, 0.1);
        assert_eq!(e.confidence, 0.9);
        assert_eq!(e.details["rms"], 0.3);
        assert_eq!(e.details["ratio"], 2.5);
    }

    #[test]
    fn kinds_are_never_mixed() {
        let events = vec![
            event(EventKind::Dropout, 0.0, 0.1),
            event(EventKind::Noise, 0.05, 0.2),
            event(EventKind::Dropout, 0.12, 0.3),
        ];
        let merged = merge_events(events, 0.15);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, EventKind::Noise);
        assert_eq!(merged[1].kind, EventKind::Dropout);
        assert_eq!(merged[1].end_time, 0.3);
    }

    #[test]
    fn filter_boundary_is_inclusive() {
        let mins = MinDurations::default();
        let events = vec![
            event(EventKind::VolumeFluctuation, 1.0, 1.25),
            event(EventKind::VolumeFluctuation, 2.0, 2.25 - EPS),
        ];
        let kept = filter_short_events(events, &mins);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].start_time, 1.0);
    }

    #[test]
    fn finalize_is_idempotent() {
        let aggregator = EventAggregator::new(&EventConfig::default());
        let raw = vec![
            event(EventKind::Noise, 0.0, 0.025),
            event(EventKind::Noise, 0.01, 0.035),
            event(EventKind::Noise, 0.02, 0.2),
            event(EventKind::Dropout, 1.0, 1.01),
            event(EventKind::VoiceDistortion, 2.0, 2.05),
            event(EventKind::VoiceDistortion, 2.5, 2.54),
        ];
        let once = aggregator.finalize(raw, 3.0, 298);
        let twice = aggregator.finalize(once.events().to_vec(), 3.0, 298);
        assert_eq!(once, twice);
        assert_eq!(once.count(EventKind::Noise), 1);
        assert_eq!(once.count(EventKind::Dropout), 0);
        assert_eq!(once.count(EventKind::VoiceDistortion), 2);
    }

    #[test]
    fn empty_input() {
        let aggregator = EventAggregator::new(&EventConfig::default());
        let result = aggregator.finalize(Vec::new(), 0.0, 0);
        assert!(result.events().is_empty());
    }
}
