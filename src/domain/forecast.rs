//! Risk report produced by the predictor.

use serde::{Deserialize, Serialize};

use crate::domain::{RiskLevel, SeverityBin, SEVERITY_BIN_COUNT};

/// Actionable risk assessment for one predicted window.
///
/// Field names serialize in the camelCase wire shape consumed by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    /// Predicted severity bin index (0-4).
    pub magnitude_bin: u8,

    /// Probability of the winning bin (0.0 to 1.0).
    pub confidence: f64,

    /// Full probability distribution over the five bins; sums to 1.
    pub probability_distribution: Vec<f64>,

    /// Midpoint of the predicted bin's magnitude range.
    pub expected_magnitude: f64,

    /// Qualitative risk classification.
    pub risk_level: RiskLevel,

    /// Numeric magnitude range of the predicted bin.
    pub magnitude_range: (f64, f64),
}

impl RiskReport {
    /// Build a report from a probability distribution over the five bins.
    ///
    /// The winning bin is the argmax; its probability becomes the confidence
    /// score.
    #[must_use]
    pub fn from_distribution(probabilities: [f64; SEVERITY_BIN_COUNT]) -> Self {
        let mut winner = 0;
        for i in 1..SEVERITY_BIN_COUNT {
            if probabilities[i] > probabilities[winner] {
                winner = i;
            }
        }

        let bin = SeverityBin::from_index(winner).unwrap_or(SeverityBin::Minor);
        Self {
            magnitude_bin: winner as u8,
            confidence: probabilities[winner],
            probability_distribution: probabilities.to_vec(),
            expected_magnitude: bin.expected_magnitude(),
            risk_level: bin.risk_level(),
            magnitude_range: bin.magnitude_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_selects_argmax_bin() {
        let report = RiskReport::from_distribution([0.05, 0.05, 0.1, 0.2, 0.6]);

        assert_eq!(report.magnitude_bin, 4);
        assert!((report.confidence - 0.6).abs() < f64::EPSILON);
        assert_eq!(report.risk_level, RiskLevel::Extreme);
        assert_eq!(report.magnitude_range, (7.0, 10.0));
        assert!((report.expected_magnitude - 8.5).abs() < f64::EPSILON);
        assert_eq!(report.probability_distribution.len(), 5);
    }

    #[test]
    fn test_uniform_distribution_picks_first_bin() {
        let report = RiskReport::from_distribution([0.2; 5]);

        assert_eq!(report.magnitude_bin, 0);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.magnitude_range, (0.0, 4.0));
    }

    #[test]
    fn test_wire_shape_uses_camel_case_keys() {
        let report = RiskReport::from_distribution([0.1, 0.1, 0.6, 0.1, 0.1]);
        let json = serde_json::to_value(&report).expect("serialize");

        assert_eq!(json["magnitudeBin"], 2);
        assert_eq!(json["riskLevel"], "medium");
        assert!(json["probabilityDistribution"].is_array());
        assert!(json["expectedMagnitude"].is_number());
        assert_eq!(json["magnitudeRange"][0], 5.0);
        assert_eq!(json["magnitudeRange"][1], 6.0);
    }
}
