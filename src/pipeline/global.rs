//! Whole-recording verdict: systematic distortion that frame rules miss.
//!
//! Two independent judgements over [`GlobalFeatures`]:
//!
//! - [`QualityAssessment`]: absolute plausibility checks (crest factor,
//!   kurtosis, fundamental share, band flatness, stability, band balance).
//!   Each failed check deducts a fixed penalty from a score of 1.0.
//! - [`GlobalComparison`]: per-descriptor relative deviation from the
//!   calibration reference.  A deviation inside the descriptor's
//!   [expected range](GlobalFeature::expected_deviation) scores 0, larger
//!   ones ramp to 1 at twice the range.  The mean score is the distortion
//!   index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::audio::global::{GlobalFeature, GlobalFeatures};
use crate::config::GlobalConfig;

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// One descriptor against its reference value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub value: f64,
    pub reference: f64,
    /// `(value − reference) / |reference|`; 0 when the reference is 0.
    pub relative: f64,
    /// In `[0, 1]`.
    pub anomaly: f64,
}

/// Anomaly in `[0, 1]` of a relative deviation against the expected range.
pub fn anomaly_score(relative: f64, expected: f64) -> f64 {
    let magnitude = relative.abs();
    if magnitude <= expected || expected <= 0.0 {
        return 0.0;
    }
    ((magnitude - expected) / expected).min(1.0)
}

/// A recording's descriptors compared with the reference recording's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalComparison {
    pub deviations: BTreeMap<GlobalFeature, Deviation>,
    /// Mean anomaly over every compared descriptor.
    pub distortion_index: f64,
    /// `distortion_index` exceeds the configured significance level.
    pub significant: bool,
}

impl GlobalComparison {
    pub fn new(
        features: &GlobalFeatures,
        reference: &GlobalFeatures,
        significant_index: f64,
    ) -> Self {
        let deviations: BTreeMap<GlobalFeature, Deviation> = GlobalFeature::ALL
            .iter()
            .map(|&feature| {
                let value = features.get(feature);
                let reference = reference.get(feature);
                let relative = if reference == 0.0 {
                    0.0
                } else {
                    (value - reference) / (reference.abs() + 1e-10)
                };
                let deviation = Deviation {
                    value,
                    reference,
                    relative,
                    anomaly: anomaly_score(relative, feature.expected_deviation()),
                };
                (feature, deviation)
            })
            .collect();

        let distortion_index =
            deviations.values().map(|d| d.anomaly).sum::<f64>() / deviations.len() as f64;
        Self {
            deviations,
            distortion_index,
            significant: distortion_index > significant_index,
        }
    }

    /// The `n` most anomalous descriptors with a non-zero score, worst first.
    pub fn worst(&self, n: usize) -> Vec<(GlobalFeature, Deviation)> {
        let mut ranked: Vec<(GlobalFeature, Deviation)> = self
            .deviations
            .iter()
            .filter(|(_, d)| d.anomaly > 0.0)
            .map(|(&f, &d)| (f, d))
            .collect();
        ranked.sort_by(|a, b| b.1.anomaly.total_cmp(&a.1.anomaly));
        ranked.truncate(n);
        ranked
    }
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Overall grade from the assessment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Good,
    Fair,
    Poor,
    Distorted,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            QualityGrade::Good
        } else if score >= 0.70 {
            QualityGrade::Fair
        } else if score >= 0.50 {
            QualityGrade::Poor
        } else {
            QualityGrade::Distorted
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QualityGrade::Good => "good",
            QualityGrade::Fair => "fair",
            QualityGrade::Poor => "poor",
            QualityGrade::Distorted => "distorted",
        })
    }
}

/// A failed plausibility check and the value that failed it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum QualityIssue {
    /// Outside `[2.5, 8]`: flattened peaks or isolated impulses.
    CrestFactor { value: f64 },
    /// Outside `[1.5, 5]`.
    Kurtosis { value: f64 },
    /// Under 15 % of power between 80 and 300 Hz.
    WeakFundamental { value: f64 },
    /// Band flatness under 0.3: a peaky, codec-like spectrum.
    PeakyBands { value: f64 },
    /// Segment RMS variation over 0.5.
    UnsteadyLevel { value: f64 },
    /// Segment centroid variation over 0.4.
    UnsteadyCentroid { value: f64 },
    /// More than 60 % of power below 1 kHz or 50 % above 4 kHz.
    SkewedBandBalance { low: f64, high: f64 },
}

impl QualityIssue {
    /// Score deducted for this issue.
    pub fn penalty(&self) -> f64 {
        match self {
            QualityIssue::CrestFactor { .. }
            | QualityIssue::Kurtosis { .. }
            | QualityIssue::WeakFundamental { .. } => 0.15,
            QualityIssue::PeakyBands { .. }
            | QualityIssue::UnsteadyLevel { .. }
            | QualityIssue::UnsteadyCentroid { .. }
            | QualityIssue::SkewedBandBalance { .. } => 0.1,
        }
    }
}

/// Absolute plausibility of a recording's descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub grade: QualityGrade,
    /// In `[0, 1]`; 1 is best.
    pub score: f64,
    pub issues: Vec<QualityIssue>,
}

impl QualityAssessment {
    pub fn of(features: &GlobalFeatures) -> Self {
        let f = features;
        let mut issues = Vec::new();

        if !(2.5..=8.0).contains(&f.crest_factor) {
            issues.push(QualityIssue::CrestFactor {
                value: f.crest_factor,
            });
        }
        if !(1.5..=5.0).contains(&f.kurtosis) {
            issues.push(QualityIssue::Kurtosis { value: f.kurtosis });
        }
        if f.fundamental_ratio < 0.15 {
            issues.push(QualityIssue::WeakFundamental {
                value: f.fundamental_ratio,
            });
        }
        if f.band_flatness < 0.3 {
            issues.push(QualityIssue::PeakyBands {
                value: f.band_flatness,
            });
        }
        if f.rms_variation > 0.5 {
            issues.push(QualityIssue::UnsteadyLevel {
                value: f.rms_variation,
            });
        }
        if f.centroid_variation > 0.4 {
            issues.push(QualityIssue::UnsteadyCentroid {
                value: f.centroid_variation,
            });
        }
        if f.low_band_ratio > 0.6 || f.high_band_ratio > 0.5 {
            issues.push(QualityIssue::SkewedBandBalance {
                low: f.low_band_ratio,
                high: f.high_band_ratio,
            });
        }

        let score = (1.0 - issues.iter().map(QualityIssue::penalty).sum::<f64>()).max(0.0);
        Self {
            grade: QualityGrade::from_score(score),
            score,
            issues,
        }
    }
}

// ---------------------------------------------------------------------------
// GlobalAnalysis
// ---------------------------------------------------------------------------

/// Whole-recording result: descriptors, assessment and, when the baseline
/// carries reference descriptors, the comparison against them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalAnalysis {
    pub features: GlobalFeatures,
    pub assessment: QualityAssessment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<GlobalComparison>,
}

impl GlobalAnalysis {
    pub fn new(
        features: GlobalFeatures,
        reference: Option<&GlobalFeatures>,
        config: &GlobalConfig,
    ) -> Self {
        Self {
            assessment: QualityAssessment::of(&features),
            comparison: reference
                .map(|r| GlobalComparison::new(&features, r, config.significant_index)),
            features,
        }
    }
}

impl std::fmt::Display for GlobalAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (score {:.2}, {} issues)",
            self.assessment.grade,
            self.assessment.score,
            self.assessment.issues.len()
        )?;
        if let Some(comparison) = &self.comparison {
            write!(
                f,
                ", distortion index {:.1}%",
                comparison.distortion_index * 100.0
            )?;
            if comparison.significant {
                f.write_str(" (significant)")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Descriptors that pass every plausibility check.
    fn plausible() -> GlobalFeatures {
        GlobalFeatures {
            rms: 0.1,
            rms_db: -20.0,
            dynamic_range: 0.6,
            spectral_centroid: 900.0,
            spectral_bandwidth: 700.0,
            low_band_ratio: 0.45,
            mid_band_ratio: 0.45,
            high_band_ratio: 0.1,
            zero_crossing_rate: 0.08,
            rms_variation: 0.2,
            centroid_variation: 0.1,
            fundamental_ratio: 0.3,
            crest_factor: 5.0,
            kurtosis: 3.0,
            band_entropy: 2.0,
            band_flatness: 0.5,
        }
    }

    #[test]
    fn anomaly_ramps_past_expected_range() {
        assert_eq!(anomaly_score(0.2, 0.3), 0.0);
        assert_eq!(anomaly_score(-0.3, 0.3), 0.0);
        assert!((anomaly_score(0.45, 0.3) - 0.5).abs() < 1e-12);
        assert!((anomaly_score(-0.45, 0.3) - 0.5).abs() < 1e-12);
        assert_eq!(anomaly_score(5.0, 0.3), 1.0);
    }

    #[test]
    fn identical_recordings_have_zero_index() {
        let comparison = GlobalComparison::new(&plausible(), &plausible(), 0.15);
        assert_eq!(comparison.deviations.len(), GlobalFeature::ALL.len());
        assert_eq!(comparison.distortion_index, 0.0);
        assert!(!comparison.significant);
        assert!(comparison.worst(3).is_empty());
    }

    #[test]
    fn deviating_descriptors_raise_the_index() {
        let reference = plausible();
        let mut degraded = plausible();
        degraded.crest_factor = 1.5; // −70 %, anomaly 1
        degraded.spectral_bandwidth = 1_050.0; // +50 %, anomaly 1
        degraded.band_flatness = 0.6; // +20 %, inside range
        degraded.kurtosis = 7.5; // +150 %, anomaly 0.5

        let comparison = GlobalComparison::new(&degraded, &reference, 0.15);
        let crest = comparison.deviations[&GlobalFeature::CrestFactor];
        assert!((crest.relative + 0.7).abs() < 1e-9);
        assert_eq!(crest.anomaly, 1.0);
        assert_eq!(comparison.deviations[&GlobalFeature::BandFlatness].anomaly, 0.0);

        assert!((comparison.distortion_index - 2.5 / 13.0).abs() < 1e-9);
        assert!(comparison.significant);

        let worst: Vec<GlobalFeature> = comparison.worst(5).into_iter().map(|(f, _)| f).collect();
        assert_eq!(worst.len(), 3);
        assert_eq!(worst[2], GlobalFeature::Kurtosis);
    }

    #[test]
    fn zero_reference_counts_as_no_deviation() {
        let mut reference = plausible();
        reference.high_band_ratio = 0.0;
        let comparison = GlobalComparison::new(&plausible(), &reference, 0.15);
        let high = comparison.deviations[&GlobalFeature::HighBandRatio];
        assert_eq!(high.relative, 0.0);
        assert_eq!(high.anomaly, 0.0);
    }

    #[test]
    fn plausible_recording_is_good() {
        let assessment = QualityAssessment::of(&plausible());
        assert_eq!(assessment.grade, QualityGrade::Good);
        assert_eq!(assessment.score, 1.0);
        assert!(assessment.issues.is_empty());
    }

    #[test]
    fn failed_checks_deduct_their_penalties() {
        let mut f = plausible();
        f.crest_factor = 1.6;
        f.kurtosis = 1.2;
        f.fundamental_ratio = 0.05;
        f.band_flatness = 0.1;

        let assessment = QualityAssessment::of(&f);
        assert_eq!(assessment.issues.len(), 4);
        assert_eq!(assessment.issues[0], QualityIssue::CrestFactor { value: 1.6 });
        assert!((assessment.score - 0.45).abs() < 1e-9);
        assert_eq!(assessment.grade, QualityGrade::Distorted);

        f = plausible();
        f.high_band_ratio = 0.55;
        f.rms_variation = 0.7;
        let assessment = QualityAssessment::of(&f);
        assert!((assessment.score - 0.8).abs() < 1e-9);
        assert_eq!(assessment.grade, QualityGrade::Fair);
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(QualityGrade::from_score(0.85), QualityGrade::Good);
        assert_eq!(QualityGrade::from_score(0.84), QualityGrade::Fair);
        assert_eq!(QualityGrade::from_score(0.70), QualityGrade::Fair);
        assert_eq!(QualityGrade::from_score(0.5), QualityGrade::Poor);
        assert_eq!(QualityGrade::from_score(0.0), QualityGrade::Distorted);
    }

    #[test]
    fn analysis_serializes_tagged_issues() {
        let mut f = plausible();
        f.kurtosis = 6.0;
        let analysis = GlobalAnalysis::new(f, Some(&plausible()), &GlobalConfig::default());

        let json: serde_json::Value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["assessment"]["grade"], "good");
        assert_eq!(json["assessment"]["issues"][0]["issue"], "kurtosis");
        assert_eq!(json["assessment"]["issues"][0]["value"], 6.0);
        assert!(json["comparison"]["deviations"]["kurtosis"]["relative"].is_number());

        let back: GlobalAnalysis = serde_json::from_value(json).unwrap();
        assert_eq!(back, analysis);

        let without = GlobalAnalysis::new(plausible(), None, &GlobalConfig::default());
        assert!(without.comparison.is_none());
        assert!(without.to_string().starts_with("good (score 1.00, 0 issues)"));
    }
}
