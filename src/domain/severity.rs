//! Severity bins and risk levels.
//!
//! Magnitudes partition into five bins; each bin maps to a qualitative risk
//! level and a numeric magnitude range used for reporting.

use serde::{Deserialize, Serialize};

/// Number of severity bins.
pub const SEVERITY_BIN_COUNT: usize = 5;

/// Severity bin derived from the magnitude partition
/// [0,4), [4,5), [5,6), [6,7), [7,∞).
///
/// The partition is total and ordered; boundaries are inclusive on the
/// lower edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityBin {
    /// Magnitude below 4.0
    Minor,
    /// Magnitude in [4.0, 5.0)
    Light,
    /// Magnitude in [5.0, 6.0)
    Moderate,
    /// Magnitude in [6.0, 7.0)
    Strong,
    /// Magnitude 7.0 and above
    Major,
}

/// Qualitative risk classification reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl SeverityBin {
    /// Classify a magnitude into its bin.
    #[must_use]
    pub fn from_magnitude(magnitude: f64) -> Self {
        if magnitude < 4.0 {
            Self::Minor
        } else if magnitude < 5.0 {
            Self::Light
        } else if magnitude < 6.0 {
            Self::Moderate
        } else if magnitude < 7.0 {
            Self::Strong
        } else {
            Self::Major
        }
    }

    /// Bin index in [0, 4].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Minor => 0,
            Self::Light => 1,
            Self::Moderate => 2,
            Self::Strong => 3,
            Self::Major => 4,
        }
    }

    /// Bin for a classifier output index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Minor),
            1 => Some(Self::Light),
            2 => Some(Self::Moderate),
            3 => Some(Self::Strong),
            4 => Some(Self::Major),
            _ => None,
        }
    }

    /// Numeric magnitude range of this bin.
    ///
    /// The top bin is open-ended; 10.0 stands in as a finite upper bound so
    /// a midpoint can be reported.
    #[must_use]
    pub fn magnitude_range(self) -> (f64, f64) {
        match self {
            Self::Minor => (0.0, 4.0),
            Self::Light => (4.0, 5.0),
            Self::Moderate => (5.0, 6.0),
            Self::Strong => (6.0, 7.0),
            Self::Major => (7.0, 10.0),
        }
    }

    /// Midpoint of the bin's range, reported as the expected magnitude.
    #[must_use]
    pub fn expected_magnitude(self) -> f64 {
        let (low, high) = self.magnitude_range();
        (low + high) / 2.0
    }

    /// Qualitative risk level for this bin.
    #[must_use]
    pub fn risk_level(self) -> RiskLevel {
        match self {
            Self::Minor | Self::Light => RiskLevel::Low,
            Self::Moderate => RiskLevel::Medium,
            Self::Strong => RiskLevel::High,
            Self::Major => RiskLevel::Extreme,
        }
    }

    /// Human-readable bin name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::Major => "major",
        }
    }
}

impl RiskLevel {
    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - Routine monitoring",
            Self::Medium => "Medium risk - Heightened attention recommended",
            Self::High => "High risk - Prepare response measures",
            Self::Extreme => "Extreme risk - Immediate action advised",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Extreme => write!(f, "EXTREME"),
        }
    }
}

impl std::fmt::Display for SeverityBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
