//! Voice quality analysis: calibrate on a clean reference, then flag noise,
//! dropouts, volume fluctuation and distortion in a recording.
//!
//! The crate is a frame-synchronous detection engine.  A waveform is cut into
//! overlapping frames, each frame becomes a [`FeatureVector`], a voice gate
//! decides whether the frame carries speech, and four detectors compare the
//! features against a calibrated [`BaselineProfile`].  Raw per-frame triggers
//! are merged and filtered into an [`AnalysisResult`].
//!
//! Alongside the frame loop, [`Analyzer::analyze_global`] summarises the
//! whole recording and compares it with the reference, which catches
//! distortion present from start to finish.
//!
//! | Module | Role |
//! |--------|------|
//! | [`audio`] | WAV ingestion, framing, spectrum, features, voice gate, whole-recording descriptors |
//! | [`calibration`] | Reference recording → baseline statistics |
//! | [`detect`] | The [`Detector`] trait and the built-in detectors |
//! | [`pipeline`] | Frame loop, streaming driver, aggregation, whole-recording verdict, report |
//! | [`config`] | TOML settings and platform paths |

pub mod audio;
pub mod calibration;
pub mod config;
pub mod detect;
pub mod pipeline;

pub use audio::FeatureVector;
pub use calibration::{BaselineProfile, Calibrator};
pub use config::AnalyzerConfig;
pub use detect::{DetectionEvent, Detector, EventKind, Reason};
pub use pipeline::{AnalysisError, AnalysisResult, Analyzer, GlobalAnalysis};
