//! Prediction service: one inference-mode pass over a caller-supplied window.
//!
//! Loads the best checkpoint fresh per invocation, validates the window,
//! applies the bundled scaler, and maps the winning bin to a risk report.
//! Every failure surfaces as a structured error; no partial result is
//! returned.

use std::sync::Arc;

use crate::domain::{RiskReport, SEVERITY_BIN_COUNT};
use crate::net::{softmax, SeverityClassifier};
use crate::ports::CheckpointStore;
use crate::QuakesenseError;

/// Service answering predict requests from the persisted checkpoint.
pub struct PredictionService<K>
where
    K: CheckpointStore,
{
    checkpoints: Arc<K>,
}

impl<K> PredictionService<K>
where
    K: CheckpointStore,
{
    /// Create a new prediction service.
    pub fn new(checkpoints: Arc<K>) -> Self {
        Self { checkpoints }
    }

    /// Classify one window of raw magnitude readings.
    ///
    /// The window must have exactly the length the checkpointed classifier
    /// was trained with; scaling is applied here from the bundled scaler.
    ///
    /// # Errors
    /// Returns `CheckpointMissing`/`CheckpointCorrupt` when no usable
    /// checkpoint exists, and `MalformedInput` for a window of the wrong
    /// length or with non-finite readings.
    pub fn predict(&self, window: &[f64]) -> Result<RiskReport, QuakesenseError> {
        let checkpoint = self
            .checkpoints
            .load()
            .map_err(|e| QuakesenseError::CheckpointCorrupt(e.to_string()))?
            .ok_or_else(|| {
                QuakesenseError::CheckpointMissing("run train before predict".to_string())
            })?;

        if window.len() != checkpoint.seq_length {
            return Err(QuakesenseError::MalformedInput(format!(
                "expected a window of {} readings, got {}",
                checkpoint.seq_length,
                window.len()
            )));
        }
        if window.iter().any(|v| !v.is_finite()) {
            return Err(QuakesenseError::MalformedInput(
                "window contains a non-finite reading".to_string(),
            ));
        }

        let mut classifier = SeverityClassifier::from_state(checkpoint.classifier)
            .map_err(|e| QuakesenseError::CheckpointCorrupt(e.to_string()))?;

        let scaled = checkpoint.scaler.transform_all(window);
        let logits = classifier.forward_eval(&scaled);
        let probabilities = softmax(&logits);

        let mut distribution = [0.0; SEVERITY_BIN_COUNT];
        for (slot, p) in distribution.iter_mut().zip(probabilities.iter()) {
            *slot = *p;
        }

        let report = RiskReport::from_distribution(distribution);
        tracing::info!(
            bin = report.magnitude_bin,
            confidence = report.confidence,
            risk = %report.risk_level,
            "Prediction complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MinMaxScaler, RiskLevel};
    use crate::net::{ClassifierConfig, ClassifierState};
    use crate::ports::Checkpoint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::convert::Infallible;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryStore {
        slot: Mutex<Option<Checkpoint>>,
    }

    impl InMemoryStore {
        fn with(checkpoint: Checkpoint) -> Self {
            Self {
                slot: Mutex::new(Some(checkpoint)),
            }
        }
    }

    impl CheckpointStore for InMemoryStore {
        type Error = Infallible;

        fn save(&self, checkpoint: &Checkpoint) -> Result<(), Infallible> {
            *self.slot.lock().expect("Lock failed") = Some(checkpoint.clone());
            Ok(())
        }

        fn load(&self) -> Result<Option<Checkpoint>, Infallible> {
            Ok(self.slot.lock().expect("Lock failed").clone())
        }
    }

    fn small_state() -> ClassifierState {
        let config = ClassifierConfig {
            input_size: 1,
            hidden_size: 4,
            num_layers: 1,
            num_classes: SEVERITY_BIN_COUNT,
            dropout: 0.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        SeverityClassifier::new(config, &mut rng).state()
    }

    /// All-zero parameters give identical logits, so softmax is uniform and
    /// the argmax falls on the first bin.
    fn zeroed_state() -> ClassifierState {
        let mut state = small_state();
        for layer in &mut state.layers {
            layer.w_ih.fill(0.0);
            layer.w_hh.fill(0.0);
            layer.b_ih.fill(0.0);
            layer.b_hh.fill(0.0);
        }
        state.fc1.w.fill(0.0);
        state.fc1.b.fill(0.0);
        state.fc2.w.fill(0.0);
        state.fc2.b.fill(0.0);
        state.fc3.w.fill(0.0);
        state.fc3.b.fill(0.0);
        state
    }

    fn checkpoint_with(state: ClassifierState, seq_length: usize) -> Checkpoint {
        let scaler = MinMaxScaler::fit(&[0.5, 9.5]).expect("fit");
        Checkpoint::new(seq_length, 1, 0.9, scaler, state)
    }

    #[test]
    fn test_missing_checkpoint_is_a_structured_error() {
        let service = PredictionService::new(Arc::new(InMemoryStore::default()));

        assert!(matches!(
            service.predict(&[5.0, 5.0, 5.0]),
            Err(QuakesenseError::CheckpointMissing(_))
        ));
    }

    #[test]
    fn test_wrong_window_length_is_malformed_input() {
        let store = InMemoryStore::with(checkpoint_with(small_state(), 4));
        let service = PredictionService::new(Arc::new(store));

        assert!(matches!(
            service.predict(&[5.0, 5.0, 5.0]),
            Err(QuakesenseError::MalformedInput(_))
        ));
        assert!(matches!(
            service.predict(&[5.0; 5]),
            Err(QuakesenseError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_non_finite_reading_is_malformed_input() {
        let store = InMemoryStore::with(checkpoint_with(small_state(), 3));
        let service = PredictionService::new(Arc::new(store));

        assert!(matches!(
            service.predict(&[5.0, f64::NAN, 5.0]),
            Err(QuakesenseError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_corrupt_parameters_are_a_structured_error() {
        let mut state = small_state();
        state.fc3.b[0] = f64::INFINITY;
        let store = InMemoryStore::with(checkpoint_with(state, 3));
        let service = PredictionService::new(Arc::new(store));

        assert!(matches!(
            service.predict(&[5.0, 5.0, 5.0]),
            Err(QuakesenseError::CheckpointCorrupt(_))
        ));
    }

    #[test]
    fn test_distribution_is_a_probability_vector() {
        let store = InMemoryStore::with(checkpoint_with(small_state(), 4));
        let service = PredictionService::new(Arc::new(store));

        let report = service.predict(&[4.0, 5.5, 6.0, 8.0]).expect("predict");

        assert_eq!(report.probability_distribution.len(), 5);
        assert!(report
            .probability_distribution
            .iter()
            .all(|&p| (0.0..=1.0).contains(&p)));
        let sum: f64 = report.probability_distribution.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(report.magnitude_bin <= 4);
        assert!((0.0..=1.0).contains(&report.confidence));
    }

    #[test]
    fn test_zeroed_model_reports_uniform_low_risk() {
        let store = InMemoryStore::with(checkpoint_with(zeroed_state(), 3));
        let service = PredictionService::new(Arc::new(store));

        let report = service.predict(&[1.0, 1.0, 1.0]).expect("predict");

        assert_eq!(report.magnitude_bin, 0);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.magnitude_range, (0.0, 4.0));
        for &p in &report.probability_distribution {
            assert!((p - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_biased_head_selects_the_major_bin() {
        // A large bias on the last logit forces bin 4 regardless of input.
        let mut state = zeroed_state();
        state.fc3.b[4] = 10.0;
        let store = InMemoryStore::with(checkpoint_with(state, 3));
        let service = PredictionService::new(Arc::new(store));

        let report = service.predict(&[8.0, 8.0, 8.0]).expect("predict");

        assert_eq!(report.magnitude_bin, 4);
        assert_eq!(report.risk_level, RiskLevel::Extreme);
        assert_eq!(report.magnitude_range, (7.0, 10.0));
        assert!((report.expected_magnitude - 8.5).abs() < f64::EPSILON);
        assert!(report.confidence > 0.9);
        assert_eq!(
            report.confidence,
            report.probability_distribution[4],
            "confidence must be the winning probability"
        );
    }
}
