//! Sequence classifier internals.
//!
//! A hand-rolled stacked LSTM encoder feeding a narrowing fully-connected
//! head, with weighted softmax cross-entropy and Adam. Parameters are `f64`
//! tensors; forward passes cache the activations needed for full-sequence
//! backpropagation through time.

mod adam;
mod classifier;
mod head;
mod loss;
mod lstm;

pub use adam::Adam;
pub use classifier::{ClassifierConfig, ClassifierGrads, ClassifierState, SeverityClassifier};
pub use head::{Dense, DenseGrads, DenseParams};
pub use loss::{argmax, softmax, WeightedCrossEntropy};
pub use lstm::{LstmGrads, LstmLayer, LstmParams};

/// Error raised when restoring classifier parameters from a checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("Layer count mismatch: expected {expected}, got {got}")]
    LayerCount { expected: usize, got: usize },

    #[error("Parameter shape mismatch in {tensor}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        tensor: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Non-finite parameter value in {0}")]
    NonFinite(&'static str),
}

/// Numerically stable logistic function.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}
