//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic, the classifier and ports to
//! implement the core use cases: training and prediction.

mod metrics;
mod predictor;
mod trainer;

pub use metrics::{ConfusionMatrix, ValidationMetrics};
pub use predictor::PredictionService;
pub use trainer::{
    class_weights, EpochState, PlateauScheduler, TrainingConfig, TrainingReport, TrainingService,
};
