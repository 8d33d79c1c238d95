//! Analyzer settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Every sub-config is
//! `#[serde(default)]`: a file only needs the fields it overrides.
//!
//! ```toml
//! [vad]
//! enabled = false
//!
//! [events]
//! merge_gap_secs = 0.2
//!
//! [events.min_duration]
//! noise = 0.15
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::detect::EventKind;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Frame segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Frame length in seconds (25 ms).
    pub frame_length_secs: f64,
    /// Distance between frame starts in seconds (10 ms).
    pub hop_secs: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_length_secs: 0.025,
            hop_secs: 0.010,
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Feature extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Fraction of spectral energy below the rolloff frequency.
    pub rolloff_fraction: f32,
    /// Sub-window length for `rms_p95`, in seconds.
    pub rms_subwindow_secs: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolloff_fraction: 0.95,
            rms_subwindow_secs: 0.005,
        }
    }
}

// ---------------------------------------------------------------------------
// CalibrationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Shortest reference recording accepted, in seconds.
    pub min_duration_secs: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// VadConfig
// ---------------------------------------------------------------------------

/// Voice-activity gate bounds.
///
/// A frame is active when at least `min_votes` of the three range checks
/// (rms, centroid, zero-crossing rate) pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// When `false` every frame counts as voice-active.
    pub enabled: bool,
    /// Absolute RMS floor; lowered to `rms.p10 · rms_p10_factor` for quiet
    /// devices.
    pub min_rms: f32,
    pub max_rms: f32,
    pub rms_p10_factor: f32,
    pub min_centroid_hz: f32,
    pub max_centroid_hz: f32,
    pub min_zcr: f32,
    pub max_zcr: f32,
    pub min_votes: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_rms: 0.02,
            max_rms: 1.0,
            rms_p10_factor: 0.5,
            min_centroid_hz: 80.0,
            max_centroid_hz: 4_000.0,
            min_zcr: 0.02,
            max_zcr: 0.25,
            min_votes: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector configs
// ---------------------------------------------------------------------------

/// Noise detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Enables the zero-crossing-rate rule (off by default: voiced
    /// fricatives trip it).
    pub detect_background_noise: bool,
    /// k1: zcr threshold is `mean + k1·std`.
    pub zcr_std_multiplier: f32,
    pub burst_rms_ratio: f32,
    pub burst_p95_ratio: f32,
    /// History mean RMS must exceed `rms.p10 · burst_floor_p10_factor`
    /// before burst ratios are trusted.
    pub burst_floor_p10_factor: f32,
    /// k2: rolloff threshold is `mean + max(k2·std, min_rolloff_margin_hz)`.
    pub rolloff_std_multiplier: f32,
    /// Smallest rolloff margin above the mean, for near-constant references.
    pub min_rolloff_margin_hz: f32,
    /// Number of previous frames averaged for the burst rule.
    pub history_len: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            detect_background_noise: false,
            zcr_std_multiplier: 2.0,
            burst_rms_ratio: 2.0,
            burst_p95_ratio: 2.0,
            burst_floor_p10_factor: 0.5,
            rolloff_std_multiplier: 2.0,
            min_rolloff_margin_hz: 80.0,
            history_len: 5,
        }
    }
}

/// Dropout detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropoutConfig {
    /// c: silence threshold is `max(rms.p10 · c, silence_rms_floor)`.
    pub silence_p10_factor: f32,
    pub silence_rms_floor: f32,
    /// Silent frames must also stay below this zero-crossing rate.
    pub zcr_threshold: f32,
    /// Surge when `rms > rolling_mean · spike_ratio`.
    pub spike_ratio: f32,
    pub history_len: usize,
}

impl Default for DropoutConfig {
    fn default() -> Self {
        Self {
            silence_p10_factor: 0.5,
            silence_rms_floor: 0.005,
            zcr_threshold: 0.05,
            spike_ratio: 3.0,
            history_len: 5,
        }
    }
}

/// Volume detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// k3: a reversal must exceed `rms.std · k3` on both sides.
    pub reversal_std_multiplier: f32,
    /// Absolute lower bound on the reversal magnitude.
    pub min_reversal_rms: f32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            reversal_std_multiplier: 1.5,
            min_reversal_rms: 0.001,
        }
    }
}

/// Distortion detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistortionConfig {
    pub peak_to_peak_threshold: f32,
    /// Absolute sample level treated as clipped.
    pub clip_level: f32,
    /// k4: flux threshold is `mean + max(k4·std, min_flux_margin)`.
    pub flux_std_multiplier: f32,
    pub min_flux_margin: f32,
    pub centroid_shift_hz: f32,
    /// k5: bandwidth deviation threshold is `max(k5·std, min_bandwidth_shift_hz)`.
    pub bandwidth_std_multiplier: f32,
    pub min_bandwidth_shift_hz: f32,
    /// Spectral rules are skipped below this frame RMS.
    pub min_rms: f32,
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            peak_to_peak_threshold: 1.8,
            clip_level: 0.99,
            flux_std_multiplier: 3.0,
            min_flux_margin: 0.02,
            centroid_shift_hz: 500.0,
            bandwidth_std_multiplier: 3.0,
            min_bandwidth_shift_hz: 100.0,
            min_rms: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// EventConfig
// ---------------------------------------------------------------------------

/// Minimum reported duration per event kind, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinDurations {
    pub noise: f64,
    pub dropout: f64,
    pub volume_fluctuation: f64,
    pub voice_distortion: f64,
}

impl MinDurations {
    pub fn for_kind(&self, kind: EventKind) -> f64 {
        match kind {
            EventKind::Noise => self.noise,
            EventKind::Dropout => self.dropout,
            EventKind::VolumeFluctuation => self.volume_fluctuation,
            EventKind::VoiceDistortion => self.voice_distortion,
        }
    }
}

impl Default for MinDurations {
    fn default() -> Self {
        Self {
            noise: 0.10,
            dropout: 0.05,
            volume_fluctuation: 0.25,
            voice_distortion: 0.03,
        }
    }
}

/// Post-processing of raw detector triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Same-kind events closer than this are merged.
    pub merge_gap_secs: f64,
    pub min_duration: MinDurations,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            merge_gap_secs: 0.15,
            min_duration: MinDurations::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GlobalConfig
// ---------------------------------------------------------------------------

/// Whole-recording analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Equal-length segments used for the stability descriptors.
    pub segments: usize,
    /// Equal-width bands of the averaged band profile.
    pub bands: usize,
    pub band_fft_len: usize,
    pub band_hop: usize,
    /// Distortion index above which a recording deviates significantly from
    /// its reference.
    pub significant_index: f64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            segments: 10,
            bands: 13,
            band_fft_len: 2_048,
            band_hop: 512,
            significant_index: 0.15,
        }
    }
}

// ---------------------------------------------------------------------------
// AnalyzerConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level analyzer configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_quality::config::AnalyzerConfig;
///
/// // Load (returns Default when file is missing)
/// let mut config = AnalyzerConfig::load().unwrap();
///
/// config.vad.enabled = false;
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub frame: FrameConfig,
    pub features: FeatureConfig,
    pub calibration: CalibrationConfig,
    pub vad: VadConfig,
    pub noise: NoiseConfig,
    pub dropout: DropoutConfig,
    pub volume: VolumeConfig,
    pub distortion: DistortionConfig,
    pub events: EventConfig,
    pub global: GlobalConfig,
}

impl AnalyzerConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AnalyzerConfig::default())` when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        log::debug!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
