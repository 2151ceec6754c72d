//! Imbalance-aware training service.
//!
//! Orchestrates the epoch loop: shuffled batches, weighted cross-entropy,
//! Adam with weight decay, plateau learning-rate reduction, validation
//! metrics, checkpointing on strict recall improvement, and the recall-gated
//! stopping rule with its epoch-cap safety valve.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::application::metrics::{ConfusionMatrix, ValidationMetrics};
use crate::domain::{
    chronological_split, clean_readings, make_windows, MinMaxScaler, WindowedDataset,
    SEVERITY_BIN_COUNT,
};
use crate::net::{argmax, Adam, ClassifierConfig, ClassifierGrads, SeverityClassifier, WeightedCrossEntropy};
use crate::ports::{Checkpoint, CheckpointStore, ReadingCatalog};
use crate::QuakesenseError;

/// Loss-weight amplification for the higher-severity bins, applied on top of
/// inverse-frequency weights so missed strong/major events cost the most.
pub const SEVERITY_EMPHASIS: [f64; SEVERITY_BIN_COUNT] = [1.0, 1.2, 1.5, 2.0, 3.0];

/// Training hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub seq_length: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub train_fraction: f64,
    pub target_recall: f64,
    pub max_epochs: usize,
    pub plateau_patience: usize,
    pub plateau_factor: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seq_length: 10,
            hidden_size: 128,
            num_layers: 2,
            dropout: 0.2,
            batch_size: 64,
            learning_rate: 1e-3,
            weight_decay: 1e-5,
            train_fraction: 0.8,
            target_recall: 0.95,
            max_epochs: 100,
            plateau_patience: 5,
            plateau_factor: 0.5,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Classifier topology implied by this config.
    #[must_use]
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            input_size: 1,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            num_classes: SEVERITY_BIN_COUNT,
            dropout: self.dropout,
        }
    }
}

/// Result of a training run, in the wire shape emitted by `train`.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub training_completed: bool,
    pub final_epoch: usize,
    pub final_metrics: ValidationMetrics,
}

/// Per-bin loss weights: inverse label frequency, amplified toward the
/// high-severity bins, renormalized to sum to 1.
#[must_use]
pub fn class_weights(labels: &[usize]) -> [f64; SEVERITY_BIN_COUNT] {
    let mut counts = [0usize; SEVERITY_BIN_COUNT];
    for &label in labels {
        if label < SEVERITY_BIN_COUNT {
            counts[label] += 1;
        }
    }

    let mut weights = [0.0; SEVERITY_BIN_COUNT];
    for bin in 0..SEVERITY_BIN_COUNT {
        weights[bin] = 1.0 / (counts[bin] as f64 + 1e-6) * SEVERITY_EMPHASIS[bin];
    }

    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Plateau-based learning-rate reduction: after `patience` consecutive
/// epochs without epoch-loss improvement, multiply the rate by `factor`.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    patience: usize,
    factor: f64,
    threshold: f64,
    best: f64,
    stale_epochs: usize,
}

impl PlateauScheduler {
    #[must_use]
    pub fn new(patience: usize, factor: f64) -> Self {
        Self {
            patience,
            factor,
            threshold: 1e-4,
            best: f64::INFINITY,
            stale_epochs: 0,
        }
    }

    /// Feed one epoch loss; reduces `learning_rate` in place and returns
    /// true when a reduction happened.
    pub fn step(&mut self, epoch_loss: f64, learning_rate: &mut f64) -> bool {
        if epoch_loss < self.best * (1.0 - self.threshold) {
            self.best = epoch_loss;
            self.stale_epochs = 0;
            return false;
        }

        self.stale_epochs += 1;
        if self.stale_epochs > self.patience {
            *learning_rate *= self.factor;
            self.stale_epochs = 0;
            return true;
        }
        false
    }
}

/// Explicit loop state: epoch counter, last validation recall, best recall.
///
/// The stopping rule and the checkpoint predicate are pure functions of this
/// state, testable without running real training.
#[derive(Debug, Clone, Default)]
pub struct EpochState {
    pub epoch: usize,
    pub recall: f64,
    pub best_recall: f64,
}

impl EpochState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The two-sided bound: keep going while the recall target is unmet and
    /// the epoch cap has headroom.
    #[must_use]
    pub fn should_continue(&self, config: &TrainingConfig) -> bool {
        self.recall < config.target_recall && self.epoch < config.max_epochs
    }

    /// Fold one epoch's validation metrics into the state.
    ///
    /// Returns true iff the recall strictly exceeded every prior epoch in
    /// this run, i.e. the checkpoint must be overwritten.
    pub fn complete_epoch(&mut self, metrics: &ValidationMetrics) -> bool {
        self.epoch += 1;
        self.recall = metrics.recall;

        if metrics.recall > self.best_recall {
            self.best_recall = metrics.recall;
            true
        } else {
            false
        }
    }
}

/// Service running the full training pipeline end-to-end.
pub struct TrainingService<C, K>
where
    C: ReadingCatalog,
    K: CheckpointStore,
{
    catalog: Arc<C>,
    checkpoints: Arc<K>,
    config: TrainingConfig,
}

impl<C, K> TrainingService<C, K>
where
    C: ReadingCatalog,
    K: CheckpointStore,
{
    /// Create a new training service.
    pub fn new(catalog: Arc<C>, checkpoints: Arc<K>, config: TrainingConfig) -> Self {
        Self {
            catalog,
            checkpoints,
            config,
        }
    }

    /// Run training to one of its two stopping conditions.
    ///
    /// # Errors
    /// Returns `DataUnavailable` if the catalog fails or is empty,
    /// `InsufficientData` if too few readings survive windowing, and a
    /// checkpoint-store error if a best snapshot cannot be written.
    pub fn run(&self) -> Result<TrainingReport, QuakesenseError> {
        let readings = self
            .catalog
            .load_readings()
            .map_err(|e| QuakesenseError::DataUnavailable(e.to_string()))?;
        let readings = clean_readings(readings);
        if readings.is_empty() {
            return Err(QuakesenseError::DataUnavailable(
                "catalog returned no usable readings".to_string(),
            ));
        }
        tracing::info!("Loaded {} readings", readings.len());

        let magnitudes: Vec<f64> = readings.iter().map(|r| r.magnitude).collect();
        let scaler = MinMaxScaler::fit(&magnitudes)
            .map_err(|e| QuakesenseError::InsufficientData(e.to_string()))?;

        let dataset = make_windows(&readings, &scaler, self.config.seq_length);
        if dataset.is_empty() {
            return Err(QuakesenseError::InsufficientData(format!(
                "{} readings yield no windows of length {}",
                readings.len(),
                self.config.seq_length
            )));
        }

        let (train, val) = chronological_split(dataset, self.config.train_fraction);
        if train.is_empty() || val.is_empty() {
            return Err(QuakesenseError::InsufficientData(
                "training or validation split is empty".to_string(),
            ));
        }
        tracing::info!(
            "Prepared {} training and {} validation windows",
            train.len(),
            val.len()
        );

        let weights = class_weights(&train.labels);
        tracing::debug!(?weights, "Class weights from training label distribution");
        let criterion = WeightedCrossEntropy::new(weights);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut classifier = SeverityClassifier::new(self.config.classifier_config(), &mut rng);
        let mut optimizer = Adam::new(
            classifier.config(),
            self.config.learning_rate,
            self.config.weight_decay,
        );
        let mut scheduler =
            PlateauScheduler::new(self.config.plateau_patience, self.config.plateau_factor);

        let mut state = EpochState::new();
        let mut final_metrics = ValidationMetrics::default();
        let mut indices: Vec<usize> = (0..train.len()).collect();

        while state.should_continue(&self.config) {
            indices.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in indices.chunks(self.config.batch_size) {
                let mut accumulated = ClassifierGrads::zeros(classifier.config());
                let mut batch_loss = 0.0;
                let mut weight_sum = 0.0;

                for &idx in batch {
                    let logits = classifier.forward_train(&train.windows[idx], &mut rng);
                    let (loss, dlogits) = criterion.loss_and_grad(&logits, train.labels[idx]);
                    let grads = classifier.backward(&dlogits);

                    accumulated.accumulate(&grads);
                    batch_loss += loss;
                    weight_sum += criterion.weight(train.labels[idx]);
                }

                if weight_sum > 0.0 {
                    accumulated.scale(1.0 / weight_sum);
                    optimizer.step(&mut classifier, &accumulated);
                    epoch_loss += batch_loss / weight_sum;
                }
            }

            let metrics = evaluate(&mut classifier, &val);

            if scheduler.step(epoch_loss, &mut optimizer.learning_rate) {
                tracing::info!(
                    learning_rate = optimizer.learning_rate,
                    "Epoch loss plateaued, learning rate reduced"
                );
            }

            let improved = state.complete_epoch(&metrics);
            if improved {
                let checkpoint = Checkpoint::new(
                    self.config.seq_length,
                    state.epoch,
                    state.best_recall,
                    scaler.clone(),
                    classifier.state(),
                );
                self.checkpoints
                    .save(&checkpoint)
                    .map_err(|e| QuakesenseError::CheckpointWrite(e.to_string()))?;
            }

            tracing::info!(
                epoch = state.epoch,
                loss = epoch_loss,
                accuracy = metrics.accuracy,
                precision = metrics.precision,
                recall = metrics.recall,
                f1 = metrics.f1_score,
                best_recall = state.best_recall,
                checkpointed = improved,
                "Epoch complete"
            );
            final_metrics = metrics;
        }

        tracing::info!(
            final_epoch = state.epoch,
            recall = state.recall,
            "Training stopped"
        );

        Ok(TrainingReport {
            training_completed: true,
            final_epoch: state.epoch,
            final_metrics,
        })
    }
}

/// Inference-mode pass over a dataset: no dropout, argmax predictions.
fn evaluate(classifier: &mut SeverityClassifier, data: &WindowedDataset) -> ValidationMetrics {
    let mut matrix = ConfusionMatrix::new();
    for (window, &label) in data.windows.iter().zip(&data.labels) {
        let logits = classifier.forward_eval(window);
        matrix.observe(label, argmax(&logits));
    }
    ValidationMetrics::from_matrix(&matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Reading;
    use chrono::{Duration, TimeZone, Utc};
    use std::convert::Infallible;
    use std::sync::Mutex;

    struct FixedCatalog {
        readings: Vec<Reading>,
    }

    impl ReadingCatalog for FixedCatalog {
        type Error = Infallible;

        fn load_readings(&self) -> Result<Vec<Reading>, Infallible> {
            Ok(self.readings.clone())
        }
    }

    #[derive(Default)]
    struct InMemoryStore {
        slot: Mutex<Option<Checkpoint>>,
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

    fn hourly_series(magnitudes: &[f64]) -> Vec<Reading> {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        magnitudes
            .iter()
            .enumerate()
            .map(|(i, &m)| Reading::new(m, start + Duration::hours(i as i64)))
            .collect()
    }

    fn tiny_config() -> TrainingConfig {
        TrainingConfig {
            seq_length: 6,
            hidden_size: 8,
            num_layers: 1,
            dropout: 0.0,
            batch_size: 8,
            learning_rate: 0.01,
            max_epochs: 15,
            seed: 42,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_class_weights_sum_to_one_and_favor_major() {
        // Realistic imbalance: many minor, few major labels.
        let labels = [vec![0usize; 700], vec![1; 150], vec![2; 90], vec![3; 40], vec![4; 20]]
            .concat();
        let weights = class_weights(&labels);

        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(weights[4] > weights[0], "{weights:?}");
        assert!(weights.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_class_weights_with_absent_bin() {
        let labels = vec![0usize; 10];
        let weights = class_weights(&labels);

        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // Unseen bins get the inverse of the epsilon count and dominate.
        assert!(weights[4] > weights[0]);
    }

    #[test]
    fn test_stopping_rule_recall_gate() {
        let config = TrainingConfig::default();
        let state = EpochState {
            epoch: 10,
            recall: 0.96,
            best_recall: 0.96,
        };
        assert!(!state.should_continue(&config));
    }

    #[test]
    fn test_stopping_rule_epoch_cap() {
        let config = TrainingConfig::default();
        let state = EpochState {
            epoch: 100,
            recall: 0.5,
            best_recall: 0.5,
        };
        assert!(!state.should_continue(&config));

        let below_cap = EpochState {
            epoch: 99,
            recall: 0.5,
            best_recall: 0.5,
        };
        assert!(below_cap.should_continue(&config));
    }

    #[test]
    fn test_checkpoint_predicate_requires_strict_improvement() {
        let mut state = EpochState::new();

        let improving = ValidationMetrics {
            recall: 0.4,
            ..ValidationMetrics::default()
        };
        assert!(state.complete_epoch(&improving));

        let equal = ValidationMetrics {
            recall: 0.4,
            ..ValidationMetrics::default()
        };
        assert!(!state.complete_epoch(&equal));

        let worse = ValidationMetrics {
            recall: 0.3,
            ..ValidationMetrics::default()
        };
        assert!(!state.complete_epoch(&worse));
        assert!((state.best_recall - 0.4).abs() < f64::EPSILON);

        let better = ValidationMetrics {
            recall: 0.41,
            ..ValidationMetrics::default()
        };
        assert!(state.complete_epoch(&better));
        assert_eq!(state.epoch, 4);
    }

    #[test]
    fn test_plateau_scheduler_halves_after_patience() {
        let mut scheduler = PlateauScheduler::new(2, 0.5);
        let mut lr = 1.0;

        assert!(!scheduler.step(10.0, &mut lr)); // establishes best
        assert!(!scheduler.step(10.0, &mut lr)); // stale 1
        assert!(!scheduler.step(10.0, &mut lr)); // stale 2
        assert!(scheduler.step(10.0, &mut lr)); // stale 3 > patience: reduce
        assert!((lr - 0.5).abs() < f64::EPSILON);

        // Improvement resets the counter.
        assert!(!scheduler.step(5.0, &mut lr));
        assert!(!scheduler.step(5.0, &mut lr));
        assert!((lr - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_catalog_is_data_unavailable() {
        let service = TrainingService::new(
            Arc::new(FixedCatalog { readings: vec![] }),
            Arc::new(InMemoryStore::default()),
            tiny_config(),
        );

        assert!(matches!(
            service.run(),
            Err(QuakesenseError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_too_few_readings_is_insufficient_data() {
        let service = TrainingService::new(
            Arc::new(FixedCatalog {
                readings: hourly_series(&[5.0, 5.1, 5.2]),
            }),
            Arc::new(InMemoryStore::default()),
            tiny_config(),
        );

        assert!(matches!(
            service.run(),
            Err(QuakesenseError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_training_on_single_class_data_converges_and_checkpoints() {
        // All magnitudes below 4.0: every label is the minor bin, so the
        // classifier collapses to it and weighted recall reaches 1.0 well
        // before the epoch cap.
        let magnitudes: Vec<f64> = (0..300).map(|i| 1.0 + (i % 25) as f64 * 0.1).collect();
        let store = Arc::new(InMemoryStore::default());
        let service = TrainingService::new(
            Arc::new(FixedCatalog {
                readings: hourly_series(&magnitudes),
            }),
            Arc::clone(&store),
            tiny_config(),
        );

        let report = service.run().expect("training should succeed");

        assert!(report.training_completed);
        assert!(report.final_epoch <= 15);
        assert!(report.final_metrics.recall >= 0.95, "{report:?}");
        // Weighted recall equals accuracy over a full-coverage label set.
        assert!(
            (report.final_metrics.recall - report.final_metrics.accuracy).abs() < 1e-12
        );

        let checkpoint = store.load().expect("load").expect("checkpoint written");
        assert!(checkpoint.best_recall >= 0.95);
        assert_eq!(checkpoint.seq_length, 6);
        assert!(checkpoint.epoch >= 1);
    }

    #[test]
    fn test_epoch_cap_bounds_non_converging_run() {
        // Alternating minor/major labels are hard for a tiny net in two
        // epochs; the cap must stop the run regardless.
        let magnitudes: Vec<f64> = (0..120)
            .map(|i| if i % 2 == 0 { 2.0 } else { 8.0 })
            .collect();
        let config = TrainingConfig {
            max_epochs: 2,
            ..tiny_config()
        };
        let service = TrainingService::new(
            Arc::new(FixedCatalog {
                readings: hourly_series(&magnitudes),
            }),
            Arc::new(InMemoryStore::default()),
            config,
        );

        let report = service.run().expect("training should succeed");
        assert!(report.final_epoch <= 2);
    }
}
