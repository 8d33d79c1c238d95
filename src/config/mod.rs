//! Configuration module.
//!
//! Provides `AnalyzerConfig` (top-level settings), sub-configs for framing,
//! features, calibration, VAD, each detector and event post-processing,
//! `AppPaths` for cross-platform directories, and TOML persistence via
//! `AnalyzerConfig::load` / `AnalyzerConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AnalyzerConfig, CalibrationConfig, DistortionConfig, DropoutConfig, EventConfig,
    FeatureConfig, FrameConfig, GlobalConfig, MinDurations, NoiseConfig, VadConfig,
    VolumeConfig,
};
