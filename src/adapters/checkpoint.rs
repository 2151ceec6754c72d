//! JSON file checkpoint store.
//!
//! The checkpoint is a single JSON artifact at a well-known path,
//! overwritten in place by the trainer and read fresh per predict
//! invocation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ports::{Checkpoint, CheckpointStore, CHECKPOINT_VERSION};

/// Error type for checkpoint store operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported checkpoint version: {0}")]
    UnsupportedVersion(u32),
}

/// Checkpoint store writing one JSON file.
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    /// Store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for JsonCheckpointStore {
    type Error = CheckpointError;

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = serde_json::to_vec(checkpoint)?;
        fs::write(&self.path, bytes)?;
        tracing::debug!(path = %self.path.display(), "Checkpoint written");
        Ok(())
    }

    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(checkpoint.version));
        }

        Ok(Some(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MinMaxScaler;
    use crate::net::{ClassifierConfig, SeverityClassifier};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_checkpoint() -> Checkpoint {
        let config = ClassifierConfig {
            input_size: 1,
            hidden_size: 2,
            num_layers: 1,
            num_classes: 5,
            dropout: 0.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let classifier = SeverityClassifier::new(config, &mut rng);
        let scaler = MinMaxScaler::fit(&[1.0, 9.0]).expect("fit");
        Checkpoint::new(10, 3, 0.72, scaler, classifier.state())
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCheckpointStore::new(dir.path().join("checkpoint.json"));

        let original = sample_checkpoint();
        store.save(&original).expect("save");

        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert_eq!(loaded.seq_length, 10);
        assert_eq!(loaded.epoch, 3);
        assert!((loaded.best_recall - 0.72).abs() < f64::EPSILON);
        assert_eq!(loaded.scaler, original.scaler);
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCheckpointStore::new(dir.path().join("absent.json"));
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoint.json");
        fs::write(&path, b"not json at all").expect("write");

        let store = JsonCheckpointStore::new(path);
        assert!(matches!(store.load(), Err(CheckpointError::Parse(_))));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = sample_checkpoint();
        checkpoint.version = 99;
        let store = JsonCheckpointStore::new(&path);
        store.save(&checkpoint).expect("save");

        assert!(matches!(
            store.load(),
            Err(CheckpointError::UnsupportedVersion(99))
        ));
    }
}
