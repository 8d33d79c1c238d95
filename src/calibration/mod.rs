//! Calibration: reference recording → [`BaselineProfile`].
//!
//! ```text
//! reference &[f32] → Calibrator → FeatureVector per frame → BaselineProfile
//!                                                         → profile.json
//! ```

pub mod baseline;
pub mod calibrator;

pub use baseline::{BaselineProfile, FeatureStats, ProfileError};
pub use calibrator::{CalibrationError, Calibrator};
