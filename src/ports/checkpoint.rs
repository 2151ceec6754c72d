//! Checkpoint port: Trait for persisting the best classifier snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::MinMaxScaler;
use crate::net::ClassifierState;

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Snapshot of the classifier at the best validation recall observed so far.
///
/// The fitted scaler travels with the parameters so inference applies the
/// exact normalization seen at training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version; readers reject versions they do not understand.
    pub version: u32,

    /// When this snapshot was written.
    pub created_at: DateTime<Utc>,

    /// Window length the classifier was trained with.
    pub seq_length: usize,

    /// Epoch (1-based) that produced this snapshot.
    pub epoch: usize,

    /// Best validation recall observed when this snapshot was written.
    pub best_recall: f64,

    /// Normalization fitted on the training series.
    pub scaler: MinMaxScaler,

    /// Full classifier parameter state.
    pub classifier: ClassifierState,
}

impl Checkpoint {
    /// Create a snapshot stamped with the current time.
    #[must_use]
    pub fn new(
        seq_length: usize,
        epoch: usize,
        best_recall: f64,
        scaler: MinMaxScaler,
        classifier: ClassifierState,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            created_at: Utc::now(),
            seq_length,
            epoch,
            best_recall,
            scaler,
            classifier,
        }
    }
}

/// Trait for checkpoint persistence.
///
/// One writer (the trainer, on strict recall improvement), one reader (the
/// predictor, fresh per invocation).
pub trait CheckpointStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Overwrite the persisted checkpoint.
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be written.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), Self::Error>;

    /// Load the persisted checkpoint.
    ///
    /// # Returns
    /// `None` if no checkpoint has been written yet.
    ///
    /// # Errors
    /// Returns error if a checkpoint exists but cannot be read.
    fn load(&self) -> Result<Option<Checkpoint>, Self::Error>;
}
