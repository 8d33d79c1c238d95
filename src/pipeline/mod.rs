//! Analysis pipeline: frame loop, event aggregation and reporting.
//!
//! # Architecture
//!
//! ```text
//! &[f32] ──▶ Analyzer::analyze ──┐
//!                                ├─▶ AnalysisSession ──▶ EventAggregator ──▶ AnalysisResult
//! mpsc ───▶ analyze_stream ──────┘        (per frame)       (merge, filter)     └─▶ Report (JSON)
//!
//! &[f32] ──▶ Analyzer::analyze_global ──▶ GlobalFeatures ──▶ GlobalAnalysis
//!                                         (whole file)       (assessment + comparison)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_quality::audio::read_wav;
//! use voice_quality::calibration::Calibrator;
//! use voice_quality::config::AnalyzerConfig;
//! use voice_quality::pipeline::Analyzer;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AnalyzerConfig::load()?;
//!
//!     let (reference, sr) = read_wav("reference.wav".as_ref())?;
//!     let baseline = Calibrator::new(&config).calibrate(&reference, sr)?;
//!
//!     let mut analyzer = Analyzer::builder(config)
//!         .baseline(Arc::new(baseline))
//!         .build()?;
//!
//!     let (samples, sr) = read_wav("call.wav".as_ref())?;
//!     let result = analyzer.analyze(&samples, sr)?;
//!     println!("{}", result.to_json_string()?);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod global;
pub mod result;
pub mod runner;
pub mod stream;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use aggregate::{filter_short_events, merge_events, EventAggregator};
pub use global::{
    GlobalAnalysis, GlobalComparison, QualityAssessment, QualityGrade, QualityIssue,
};
pub use result::{AnalysisResult, KindReport, Report, ReportEvent};
pub use runner::{AnalysisError, AnalysisSession, Analyzer, AnalyzerBuilder};
pub use stream::{analyze_stream, FrameAssembler};
