//! Audio front end: ingestion → framing → spectrum → features → VAD.
//!
//! # Pipeline
//!
//! ```text
//! WAV / &[f32] → read_wav / clamp_samples → FrameSource → SpectrumAnalyzer
//!             → FeatureExtractor → FeatureVector → VoiceActivityGate
//!
//! &[f32] → GlobalFeatures::compute            (whole recording)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use voice_quality::audio::{FeatureExtractor, FrameSource};
//! use voice_quality::config::{FeatureConfig, FrameConfig};
//!
//! let samples: Vec<f32> = (0..16_000)
//!     .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 16_000.0).sin())
//!     .collect();
//!
//! let source = FrameSource::from_config(&samples, 16_000, &FrameConfig::default()).unwrap();
//! let mut extractor = FeatureExtractor::new(FeatureConfig::default());
//! let features: Vec<_> = source.frames().map(|f| extractor.extract(&f)).collect();
//! assert_eq!(features.len(), source.len());
//! ```

pub mod buffer;
pub mod features;
pub mod frame;
pub mod global;
pub mod ingest;
pub mod spectrum;
pub mod vad;

pub use buffer::RingBuffer;
pub use features::{Feature, FeatureExtractor, FeatureVector};
pub use frame::{Frame, FrameError, FrameLayout, FrameSource, Frames};
pub use global::{GlobalError, GlobalFeature, GlobalFeatures};
pub use ingest::{clamp_samples, read_wav, stereo_to_mono, IngestError};
pub use spectrum::{Spectrum, SpectrumAnalyzer};
pub use vad::VoiceActivityGate;
