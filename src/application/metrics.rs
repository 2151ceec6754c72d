//! Validation metrics over the five severity bins.
//!
//! Precision, recall and F1 are support-weighted averages of the per-class
//! scores; classes with zero support (or an undefined denominator)
//! contribute zero rather than an error.

use serde::{Deserialize, Serialize};

use crate::domain::SEVERITY_BIN_COUNT;

/// Confusion counts, `counts[actual][predicted]`.
#[derive(Debug, Clone, Default)]
pub struct ConfusionMatrix {
    counts: [[usize; SEVERITY_BIN_COUNT]; SEVERITY_BIN_COUNT],
}

impl ConfusionMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one (actual, predicted) observation. Out-of-range indices are
    /// ignored.
    pub fn observe(&mut self, actual: usize, predicted: usize) {
        if actual < SEVERITY_BIN_COUNT && predicted < SEVERITY_BIN_COUNT {
            self.counts[actual][predicted] += 1;
        }
    }

    /// Total number of observations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Number of observations whose actual class is `class`.
    #[must_use]
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    /// Fraction of observations predicted correctly.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..SEVERITY_BIN_COUNT).map(|c| self.counts[c][c]).sum();
        correct as f64 / total as f64
    }

    fn precision_of(&self, class: usize) -> f64 {
        let predicted: usize = (0..SEVERITY_BIN_COUNT).map(|a| self.counts[a][class]).sum();
        if predicted == 0 {
            return 0.0;
        }
        self.counts[class][class] as f64 / predicted as f64
    }

    fn recall_of(&self, class: usize) -> f64 {
        let support = self.support(class);
        if support == 0 {
            return 0.0;
        }
        self.counts[class][class] as f64 / support as f64
    }

    fn f1_of(&self, class: usize) -> f64 {
        let p = self.precision_of(class);
        let r = self.recall_of(class);
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }

    fn weighted(&self, score: impl Fn(usize) -> f64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (0..SEVERITY_BIN_COUNT)
            .map(|c| self.support(c) as f64 * score(c))
            .sum::<f64>()
            / total as f64
    }

    /// Support-weighted precision.
    #[must_use]
    pub fn weighted_precision(&self) -> f64 {
        self.weighted(|c| self.precision_of(c))
    }

    /// Support-weighted recall.
    #[must_use]
    pub fn weighted_recall(&self) -> f64 {
        self.weighted(|c| self.recall_of(c))
    }

    /// Support-weighted F1.
    #[must_use]
    pub fn weighted_f1(&self) -> f64 {
        self.weighted(|c| self.f1_of(c))
    }
}

/// Validation scores reported after each epoch and in the final result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl ValidationMetrics {
    /// Compute all scores from a confusion matrix.
    #[must_use]
    pub fn from_matrix(matrix: &ConfusionMatrix) -> Self {
        Self {
            accuracy: matrix.accuracy(),
            precision: matrix.weighted_precision(),
            recall: matrix.weighted_recall(),
            f1_score: matrix.weighted_f1(),
        }
    }
}
