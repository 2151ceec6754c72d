//! Magnitude readings from the upstream catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One magnitude reading from the upstream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Earthquake magnitude. Only positive values are usable.
    pub magnitude: f64,

    /// Time the reading was recorded; the windowing transform requires
    /// readings sorted by this key.
    pub occurred_at: DateTime<Utc>,
}

impl Reading {
    /// Create a new reading.
    #[must_use]
    pub fn new(magnitude: f64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            magnitude,
            occurred_at,
        }
    }

    /// Whether this reading can enter the pipeline.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.magnitude.is_finite() && self.magnitude > 0.0
    }
}

/// Drop unusable readings and sort the rest by time.
///
/// Non-finite and non-positive magnitudes are removed before windowing.
#[must_use]
pub fn clean_readings(mut readings: Vec<Reading>) -> Vec<Reading> {
    readings.retain(Reading::is_usable);
    readings.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
    readings
}
