//! Min-max normalization for magnitude series.
//!
//! The scaler is fit once on the full series and travels inside the model
//! checkpoint so inference applies exactly the statistics seen at training.

use serde::{Deserialize, Serialize};

/// Error produced when fitting a scaler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScalerError {
    #[error("Cannot fit scaler on an empty series")]
    EmptySeries,

    #[error("Series contains a non-finite value")]
    NonFinite,
}

/// Min-max scaler mapping the fitted range onto [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    /// Fit the scaler over a magnitude series.
    ///
    /// # Errors
    /// Returns error if the series is empty or contains non-finite values.
    pub fn fit(values: &[f64]) -> Result<Self, ScalerError> {
        if values.is_empty() {
            return Err(ScalerError::EmptySeries);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ScalerError::NonFinite);
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            min,
            range: max - min,
        })
    }

    /// Scale a single value with the fitted statistics.
    ///
    /// A degenerate (constant) fit maps everything to 0.0.
    #[must_use]
    pub fn transform(&self, value: f64) -> f64 {
        if self.range == 0.0 {
            0.0
        } else {
            (value - self.min) / self.range
        }
    }

    /// Scale a whole series.
    #[must_use]
    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }
}
