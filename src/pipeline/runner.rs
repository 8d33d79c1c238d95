//! Analyzer: drives the frame loop: framing → features → VAD → detectors.
//!
//! [`Analyzer`] owns the detector registry, the feature extractor and the
//! voice gate.  It is built through [`AnalyzerBuilder`], which checks up
//! front that every detector needing a calibration baseline gets one.
//!
//! # Analysis flow
//!
//! ```text
//! Analyzer::analyze(samples, sample_rate)
//!   └─▶ session(sample_rate)            reset extractor + detectors
//!         └─▶ for each Frame:
//!               FeatureExtractor::extract
//!               VoiceActivityGate::is_active
//!               Detector::detect × N    → raw events
//!         └─▶ finish(total_duration)
//!               Detector::finish × N    → close open events
//!               EventAggregator::finalize → AnalysisResult
//! ```
//!
//! [`AnalysisSession`] exposes the same loop frame by frame for callers that
//! receive audio incrementally (see [`crate::pipeline::stream`]).

use std::sync::Arc;

use thiserror::Error;

use crate::audio::features::FeatureExtractor;
use crate::audio::frame::{Frame, FrameError, FrameLayout, FrameSource};
use crate::audio::global::{GlobalError, GlobalFeatures};
use crate::audio::vad::VoiceActivityGate;
use crate::calibration::BaselineProfile;
use crate::config::AnalyzerConfig;
use crate::detect::{default_detectors, DetectionEvent, Detector};
use crate::pipeline::aggregate::EventAggregator;
use crate::pipeline::global::GlobalAnalysis;
use crate::pipeline::result::AnalysisResult;

// ---------------------------------------------------------------------------
// AnalysisError
// ---------------------------------------------------------------------------

/// Configuration problems detected before any frame is processed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A registered detector needs a baseline and none was supplied.
    #[error("detector `{detector}` requires a baseline profile; run calibration first")]
    MissingBaseline { detector: &'static str },

    /// The baseline was calibrated at a different sample rate.
    #[error("baseline was calibrated at {baseline} Hz but input is {input} Hz")]
    SampleRateMismatch { baseline: u32, input: u32 },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Global(#[from] GlobalError),
}

// ---------------------------------------------------------------------------
// AnalyzerBuilder
// ---------------------------------------------------------------------------

/// Assembles an [`Analyzer`].
///
/// The registry starts with the four built-in detectors;
/// [`with_detector`](Self::with_detector) appends to it and
/// [`detectors`](Self::detectors) replaces it.
pub struct AnalyzerBuilder {
    config: AnalyzerConfig,
    baseline: Option<Arc<BaselineProfile>>,
    detectors: Vec<Box<dyn Detector>>,
}

impl AnalyzerBuilder {
    fn new(config: AnalyzerConfig) -> Self {
        let detectors = default_detectors(&config);
        Self {
            config,
            baseline: None,
            detectors,
        }
    }

    /// Use `baseline` for every threshold.
    pub fn baseline(mut self, baseline: Arc<BaselineProfile>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Register an additional detector.
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Replace the registry.
    pub fn detectors(mut self, detectors: Vec<Box<dyn Detector>>) -> Self {
        self.detectors = detectors;
        self
    }

    /// Validate the configuration and build the analyzer.
    ///
    /// Fails with [`AnalysisError::MissingBaseline`] naming the first
    /// detector that needs a baseline when none was given.
    pub fn build(self) -> Result<Analyzer, AnalysisError> {
        let baseline = match self.baseline {
            Some(baseline) => Some(baseline),
            None => {
                if let Some(detector) = self.detectors.iter().find(|d| d.requires_baseline()) {
                    return Err(AnalysisError::MissingBaseline {
                        detector: detector.name(),
                    });
                }
                None
            }
        };

        let names: Vec<&str> = self.detectors.iter().map(|d| d.name()).collect();
        log::debug!(
            "analyzer: detectors [{}], vad {}",
            names.join(", "),
            if self.config.vad.enabled { "on" } else { "off" }
        );

        Ok(Analyzer {
            extractor: FeatureExtractor::new(self.config.features.clone()),
            gate: VoiceActivityGate::new(self.config.vad.clone()),
            aggregator: EventAggregator::new(&self.config.events),
            calibrated: baseline.is_some(),
            baseline: baseline.unwrap_or_else(|| Arc::new(BaselineProfile::neutral())),
            detectors: self.detectors,
            config: self.config,
        })
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Frame-synchronous quality analyzer.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use voice_quality::calibration::Calibrator;
/// use voice_quality::config::AnalyzerConfig;
/// use voice_quality::detect::EventKind;
/// use voice_quality::pipeline::Analyzer;
///
/// let config = AnalyzerConfig::default();
/// let tone: Vec<f32> = (0..16_000 * 6)
///     .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / 16_000.0).sin())
///     .collect();
///
/// let baseline = Calibrator::new(&config).calibrate(&tone, 16_000).unwrap();
/// let mut analyzer = Analyzer::builder(config)
///     .baseline(Arc::new(baseline))
///     .build()
///     .unwrap();
///
/// let silence = vec![0.0_f32; 16_000];
/// let result = analyzer.analyze(&silence, 16_000).unwrap();
/// assert_eq!(result.count(EventKind::Dropout), 0);
/// ```
pub struct Analyzer {
    config: AnalyzerConfig,
    baseline: Arc<BaselineProfile>,
    /// Whether `baseline` came from calibration (and pins the sample rate).
    calibrated: bool,
    extractor: FeatureExtractor,
    gate: VoiceActivityGate,
    detectors: Vec<Box<dyn Detector>>,
    aggregator: EventAggregator,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("calibrated", &self.calibrated)
            .field(
                "detectors",
                &self.detectors.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Start building an analyzer with `config`.
    pub fn builder(config: AnalyzerConfig) -> AnalyzerBuilder {
        AnalyzerBuilder::new(config)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn baseline(&self) -> &BaselineProfile {
        &self.baseline
    }

    /// Frame length and hop at `sample_rate`.
    pub fn frame_layout(&self, sample_rate: u32) -> Result<FrameLayout, FrameError> {
        FrameLayout::from_config(&self.config.frame, sample_rate)
    }

    fn check_sample_rate(&self, sample_rate: u32) -> Result<(), AnalysisError> {
        if sample_rate == 0 {
            return Err(FrameError::ZeroSampleRate.into());
        }
        if self.calibrated && self.baseline.sample_rate != sample_rate {
            return Err(AnalysisError::SampleRateMismatch {
                baseline: self.baseline.sample_rate,
                input: sample_rate,
            });
        }
        Ok(())
    }

    /// Start a fresh pass over a stream at `sample_rate`.
    ///
    /// All detector and extractor state from previous passes is discarded.
    pub fn session(&mut self, sample_rate: u32) -> Result<AnalysisSession<'_>, AnalysisError> {
        self.check_sample_rate(sample_rate)?;

        self.extractor.reset();
        for detector in &mut self.detectors {
            detector.reset();
        }

        Ok(AnalysisSession {
            analyzer: self,
            raw: Vec::new(),
            frame_count: 0,
            last_end: 0.0,
        })
    }

    /// Analyze a complete waveform.
    pub fn analyze(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<AnalysisResult, AnalysisError> {
        let source = FrameSource::from_config(samples, sample_rate, &self.config.frame)?;
        let mut session = self.session(sample_rate)?;
        for frame in source.frames() {
            session.process(&frame);
        }
        Ok(session.finish(source.duration_secs()))
    }

    /// Summarise the whole waveform and judge it for systematic distortion.
    ///
    /// The comparison is included when the baseline carries whole-recording
    /// descriptors of its reference.
    pub fn analyze_global(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<GlobalAnalysis, AnalysisError> {
        self.check_sample_rate(sample_rate)?;
        let features = GlobalFeatures::compute(samples, sample_rate, &self.config.global)?;
        let analysis = GlobalAnalysis::new(
            features,
            self.baseline.global.as_ref(),
            &self.config.global,
        );
        log::info!("analyzer: global {analysis}");
        Ok(analysis)
    }
}

// ---------------------------------------------------------------------------
// AnalysisSession
// ---------------------------------------------------------------------------

/// One pass of an [`Analyzer`] over a stream, fed frame by frame.
pub struct AnalysisSession<'a> {
    analyzer: &'a mut Analyzer,
    raw: Vec<DetectionEvent>,
    frame_count: usize,
    /// End time of the last processed frame.
    last_end: f64,
}

impl AnalysisSession<'_> {
    /// Run one frame through extraction, the voice gate and every detector.
    ///
    /// Frames must arrive in time order.
    pub fn process(&mut self, frame: &Frame<'_>) {
        let analyzer = &mut *self.analyzer;
        let features = analyzer.extractor.extract(frame);
        let voice_active = analyzer.gate.is_active(&features, &analyzer.baseline);

        for detector in &mut analyzer.detectors {
            if let Some(event) = detector.detect(&features, frame, &analyzer.baseline, voice_active)
            {
                log::trace!(
                    "analyzer: {} {:?} at {:.3}s",
                    detector.name(),
                    event.reason,
                    event.start_time
                );
                self.raw.push(event);
            }
        }

        self.frame_count += 1;
        self.last_end = frame.end_time;
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Raw (unmerged) events emitted so far.
    pub fn raw_events(&self) -> &[DetectionEvent] {
        &self.raw
    }

    /// Close open events and aggregate everything into the final result.
    pub fn finish(mut self, total_duration: f64) -> AnalysisResult {
        for detector in &mut self.analyzer.detectors {
            if let Some(event) = detector.finish(self.last_end) {
                self.raw.push(event);
            }
        }

        let result = self
            .analyzer
            .aggregator
            .finalize(self.raw, total_duration, self.frame_count);
        log::info!("analyzer: {result}");
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::FeatureVector;
    use crate::detect::{EventKind, Reason};

    /// 200 Hz at 16 kHz, generated from the phase within each 80-sample
    /// period so every frame is bit-identical.
    fn tone(secs: f64, amplitude: f32) -> Vec<f32> {
        let n = (secs * 16_000.0) as usize;
        (0..n)
            .map(|i| {
                let phase = (i % 80) as f32 / 80.0;
                amplitude * (2.0 * std::f32::consts::PI * phase).sin()
            })
            .collect()
    }

    fn tone_baseline() -> Arc<BaselineProfile> {
        let profile = crate::calibration::Calibrator::new(&AnalyzerConfig::default())
            .calibrate(&tone(5.0, 0.3), 16_000)
            .unwrap();
        Arc::new(profile)
    }

    /// Flags every frame louder than 0.5 RMS; needs no baseline.
    struct LoudFrames;

    impl Detector for LoudFrames {
        fn kind(&self) -> EventKind {
            EventKind::VoiceDistortion
        }

        fn name(&self) -> &'static str {
            "loud"
        }

        fn requires_baseline(&self) -> bool {
            false
        }

        fn detect(
            &mut self,
            features: &FeatureVector,
            frame: &Frame<'_>,
            _baseline: &BaselineProfile,
            _voice_active: bool,
        ) -> Option<DetectionEvent> {
            (features.rms > 0.5).then(|| {
                DetectionEvent::for_frame(EventKind::VoiceDistortion, frame, 1.0, Reason::Clipping)
            })
        }

        fn reset(&mut self) {}
    }

    #[test]
    fn missing_baseline_names_first_detector() {
        let err = Analyzer::builder(AnalyzerConfig::default())
            .build()
            .unwrap_err();
        match err {
            AnalysisError::MissingBaseline { detector } => assert_eq!(detector, "noise"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn baseline_free_registry_builds_without_profile() {
        let mut analyzer = Analyzer::builder(AnalyzerConfig::default())
            .detectors(vec![Box::new(LoudFrames)])
            .build()
            .unwrap();

        // No calibration: any sample rate is accepted.
        let mut samples = vec![0.0_f32; 8_000];
        samples.extend(vec![0.8_f32; 4_000]);
        let result = analyzer.analyze(&samples, 8_000).unwrap();
        assert_eq!(result.count(EventKind::VoiceDistortion), 1);
    }

    #[test]
    fn appended_detector_still_needs_baseline_for_builtins() {
        let err = Analyzer::builder(AnalyzerConfig::default())
            .with_detector(Box::new(LoudFrames))
            .build()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingBaseline { .. }));
    }

    #[test]
    fn sample_rate_must_match_baseline() {
        let mut analyzer = Analyzer::builder(AnalyzerConfig::default())
            .baseline(tone_baseline())
            .build()
            .unwrap();
        let err = analyzer.analyze(&vec![0.0; 48_000], 48_000).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::SampleRateMismatch {
                baseline: 16_000,
                input: 48_000
            }
        ));
    }

    #[test]
    fn steady_tone_is_clean_and_frames_are_counted() {
        let mut analyzer = Analyzer::builder(AnalyzerConfig::default())
            .baseline(tone_baseline())
            .build()
            .unwrap();
        let result = analyzer.analyze(&tone(2.0, 0.3), 16_000).unwrap();
        // (32000 − 400) / 160 + 1
        assert_eq!(result.frame_count(), 198);
        assert!((result.total_duration() - 2.0).abs() < 1e-9);
        assert_eq!(result.count(EventKind::Dropout), 0);
        assert_eq!(result.count(EventKind::VolumeFluctuation), 0);
    }

    #[test]
    fn repeated_analysis_gives_identical_results() {
        let mut analyzer = Analyzer::builder(AnalyzerConfig::default())
            .baseline(tone_baseline())
            .build()
            .unwrap();
        let mut input = tone(3.0, 0.3);
        for s in &mut input[16_000..19_200] {
            *s = 0.0;
        }
        let first = analyzer.analyze(&input, 16_000).unwrap();
        let second = analyzer.analyze(&input, 16_000).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.count(EventKind::Dropout), 1);
    }

    #[test]
    fn global_analysis_compares_against_the_reference() {
        let analyzer = Analyzer::builder(AnalyzerConfig::default())
            .baseline(tone_baseline())
            .build()
            .unwrap();

        let same = analyzer.analyze_global(&tone(5.0, 0.3), 16_000).unwrap();
        let comparison = same.comparison.expect("reference descriptors");
        assert_eq!(comparison.distortion_index, 0.0);
        assert!(!comparison.significant);

        let squashed: Vec<f32> = tone(5.0, 0.3)
            .into_iter()
            .map(|s| s.clamp(-0.05, 0.05))
            .collect();
        let clipped = analyzer.analyze_global(&squashed, 16_000).unwrap();
        assert!(clipped.comparison.expect("comparison").significant);

        assert!(matches!(
            analyzer.analyze_global(&tone(1.0, 0.3), 8_000),
            Err(AnalysisError::SampleRateMismatch { .. })
        ));
    }

    #[test]
    fn global_analysis_without_reference_only_assesses() {
        let analyzer = Analyzer::builder(AnalyzerConfig::default())
            .detectors(vec![Box::new(LoudFrames)])
            .build()
            .unwrap();
        let analysis = analyzer.analyze_global(&tone(1.0, 0.3), 8_000).unwrap();
        assert!(analysis.comparison.is_none());
        assert!((analysis.features.rms - 0.3 / 2f64.sqrt()).abs() < 1e-3);

        assert!(matches!(
            analyzer.analyze_global(&[0.1; 4], 8_000),
            Err(AnalysisError::Global(GlobalError::TooShort { .. }))
        ));
    }

    #[test]
    fn session_matches_batch_analysis() {
        let mut analyzer = Analyzer::builder(AnalyzerConfig::default())
            .baseline(tone_baseline())
            .build()
            .unwrap();
        let mut input = tone(2.0, 0.3);
        input[12_345] = 1.0;

        let batch = analyzer.analyze(&input, 16_000).unwrap();

        let source = FrameSource::from_config(&input, 16_000, &AnalyzerConfig::default().frame)
            .unwrap();
        let mut session = analyzer.session(16_000).unwrap();
        for frame in source.frames() {
            session.process(&frame);
        }
        assert_eq!(session.frame_count(), source.len());
        assert!(!session.raw_events().is_empty());
        let incremental = session.finish(source.duration_secs());

        assert_eq!(batch, incremental);
        assert_eq!(batch.count(EventKind::VoiceDistortion), 1);
    }
}
