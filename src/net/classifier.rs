//! Stacked LSTM encoder with a narrowing classification head.
//!
//! The encoder consumes the window left-to-right; only the final hidden
//! state feeds the hidden→64→32→classes head (ReLU, dropout after the first
//! hidden layer). The output is raw logits; callers apply softmax when a
//! distribution is needed, so the same forward serves loss computation and
//! inference.

use ndarray::Array1;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::head::{dropout_mask, Dense, DenseGrads, DenseParams};
use super::lstm::{LstmGrads, LstmLayer, LstmParams};
use super::NetError;
use crate::domain::SEVERITY_BIN_COUNT;

const FC1_UNITS: usize = 64;
const FC2_UNITS: usize = 32;

/// Architecture hyperparameters; persisted with the parameters so a
/// checkpoint can only be restored into the topology that wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub num_classes: usize,
    pub dropout: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_size: 1,
            hidden_size: 128,
            num_layers: 2,
            num_classes: SEVERITY_BIN_COUNT,
            dropout: 0.2,
        }
    }
}

/// Serializable parameter state; round-trips through the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierState {
    pub config: ClassifierConfig,
    pub layers: Vec<LstmParams>,
    pub fc1: DenseParams,
    pub fc2: DenseParams,
    pub fc3: DenseParams,
}

/// Gradients for every parameter family.
#[derive(Debug, Clone)]
pub struct ClassifierGrads {
    pub lstm: Vec<LstmGrads>,
    pub fc1: DenseGrads,
    pub fc2: DenseGrads,
    pub fc3: DenseGrads,
}

impl ClassifierGrads {
    #[must_use]
    pub fn zeros(config: &ClassifierConfig) -> Self {
        let lstm = (0..config.num_layers)
            .map(|li| {
                let input_dim = if li == 0 {
                    config.input_size
                } else {
                    config.hidden_size
                };
                LstmGrads::zeros(input_dim, config.hidden_size)
            })
            .collect();

        Self {
            lstm,
            fc1: DenseGrads::zeros(config.hidden_size, FC1_UNITS),
            fc2: DenseGrads::zeros(FC1_UNITS, FC2_UNITS),
            fc3: DenseGrads::zeros(FC2_UNITS, config.num_classes),
        }
    }

    pub fn accumulate(&mut self, other: &Self) {
        for (mine, theirs) in self.lstm.iter_mut().zip(&other.lstm) {
            mine.accumulate(theirs);
        }
        self.fc1.accumulate(&other.fc1);
        self.fc2.accumulate(&other.fc2);
        self.fc3.accumulate(&other.fc3);
    }

    pub fn scale(&mut self, factor: f64) {
        for g in &mut self.lstm {
            g.scale(factor);
        }
        self.fc1.scale(factor);
        self.fc2.scale(factor);
        self.fc3.scale(factor);
    }
}

/// The sequence classifier.
pub struct SeverityClassifier {
    config: ClassifierConfig,
    pub(crate) layers: Vec<LstmLayer>,
    pub(crate) fc1: Dense,
    pub(crate) fc2: Dense,
    pub(crate) fc3: Dense,

    // Caches from the last forward pass, consumed by backward.
    seq_len: usize,
    inter_masks: Vec<Array1<f64>>,
    relu1_mask: Array1<f64>,
    relu2_mask: Array1<f64>,
    drop_mask: Array1<f64>,
}

impl SeverityClassifier {
    /// Freshly initialized classifier.
    #[must_use]
    pub fn new(config: ClassifierConfig, rng: &mut ChaCha8Rng) -> Self {
        let mut layers = Vec::with_capacity(config.num_layers);
        let mut input_dim = config.input_size;
        for _ in 0..config.num_layers {
            layers.push(LstmLayer::new(input_dim, config.hidden_size, rng));
            input_dim = config.hidden_size;
        }

        let fc1 = Dense::new(config.hidden_size, FC1_UNITS, rng);
        let fc2 = Dense::new(FC1_UNITS, FC2_UNITS, rng);
        let fc3 = Dense::new(FC2_UNITS, config.num_classes, rng);

        Self {
            config,
            layers,
            fc1,
            fc2,
            fc3,
            seq_len: 0,
            inter_masks: Vec::new(),
            relu1_mask: Array1::zeros(FC1_UNITS),
            relu2_mask: Array1::zeros(FC2_UNITS),
            drop_mask: Array1::ones(FC1_UNITS),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Snapshot of all learned parameters.
    #[must_use]
    pub fn state(&self) -> ClassifierState {
        ClassifierState {
            config: self.config,
            layers: self.layers.iter().map(|l| l.params.clone()).collect(),
            fc1: self.fc1.params.clone(),
            fc2: self.fc2.params.clone(),
            fc3: self.fc3.params.clone(),
        }
    }

    /// Rebuild a classifier from a saved state.
    ///
    /// # Errors
    /// Returns error if layer counts or tensor shapes disagree with the
    /// recorded config, or any value is non-finite.
    pub fn from_state(state: ClassifierState) -> Result<Self, NetError> {
        validate_state(&state)?;

        let config = state.config;
        let layers = state.layers.into_iter().map(LstmLayer::from_params).collect();

        Ok(Self {
            config,
            layers,
            fc1: Dense::from_params(state.fc1),
            fc2: Dense::from_params(state.fc2),
            fc3: Dense::from_params(state.fc3),
            seq_len: 0,
            inter_masks: Vec::new(),
            relu1_mask: Array1::zeros(FC1_UNITS),
            relu2_mask: Array1::zeros(FC2_UNITS),
            drop_mask: Array1::ones(FC1_UNITS),
        })
    }

    /// Training-mode forward: dropout masks are sampled from `rng`.
    pub fn forward_train(&mut self, window: &[f64], rng: &mut ChaCha8Rng) -> Array1<f64> {
        self.run(window, Some(rng))
    }

    /// Inference-mode forward: dropout disabled, all masks are identity.
    pub fn forward_eval(&mut self, window: &[f64]) -> Array1<f64> {
        self.run(window, None)
    }

    fn run(&mut self, window: &[f64], mut rng: Option<&mut ChaCha8Rng>) -> Array1<f64> {
        let hidden = self.config.hidden_size;
        let dropout = self.config.dropout;

        let mut inputs: Vec<Array1<f64>> = window
            .iter()
            .map(|&v| Array1::from_elem(self.config.input_size, v))
            .collect();
        self.seq_len = inputs.len();

        self.inter_masks.clear();
        for li in 0..self.layers.len() {
            let mut outputs = self.layers[li].forward(&inputs);

            // One locked dropout mask per sequence between stacked layers.
            if li + 1 < self.layers.len() {
                let mask = match rng.as_deref_mut() {
                    Some(r) if dropout > 0.0 => dropout_mask(hidden, dropout, r),
                    _ => Array1::ones(hidden),
                };
                for h in &mut outputs {
                    *h = &*h * &mask;
                }
                self.inter_masks.push(mask);
            }

            inputs = outputs;
        }

        let h_last = inputs
            .last()
            .cloned()
            .unwrap_or_else(|| Array1::zeros(hidden));

        let a1 = self.fc1.forward(&h_last);
        self.relu1_mask = a1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let r1 = &a1 * &self.relu1_mask;

        self.drop_mask = match rng.as_deref_mut() {
            Some(r) if dropout > 0.0 => dropout_mask(FC1_UNITS, dropout, r),
            _ => Array1::ones(FC1_UNITS),
        };
        let d1 = &r1 * &self.drop_mask;

        let a2 = self.fc2.forward(&d1);
        self.relu2_mask = a2.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let r2 = &a2 * &self.relu2_mask;

        self.fc3.forward(&r2)
    }

    /// Backpropagate the logit gradient from the last forward pass.
    pub fn backward(&mut self, dlogits: &Array1<f64>) -> ClassifierGrads {
        let (g3, d_r2) = self.fc3.backward(dlogits);
        let d_a2 = &d_r2 * &self.relu2_mask;
        let (g2, d_d1) = self.fc2.backward(&d_a2);
        let d_r1 = &d_d1 * &self.drop_mask;
        let d_a1 = &d_r1 * &self.relu1_mask;
        let (g1, dh_last) = self.fc1.backward(&d_a1);

        let hidden = self.config.hidden_size;
        let mut dh_seq: Vec<Array1<f64>> = vec![Array1::zeros(hidden); self.seq_len];
        if let Some(last) = dh_seq.last_mut() {
            *last = dh_last;
        }

        let mut lstm_rev = Vec::with_capacity(self.layers.len());
        for li in (0..self.layers.len()).rev() {
            let (grads, dx_seq) = self.layers[li].backward(&dh_seq);
            lstm_rev.push(grads);

            if li > 0 {
                let mask = &self.inter_masks[li - 1];
                dh_seq = dx_seq.into_iter().map(|dx| &dx * mask).collect();
            }
        }
        lstm_rev.reverse();

        ClassifierGrads {
            lstm: lstm_rev,
            fc1: g1,
            fc2: g2,
            fc3: g3,
        }
    }
}

fn validate_state(state: &ClassifierState) -> Result<(), NetError> {
    let cfg = &state.config;

    if state.layers.len() != cfg.num_layers {
        return Err(NetError::LayerCount {
            expected: cfg.num_layers,
            got: state.layers.len(),
        });
    }

    let mut input_dim = cfg.input_size;
    for params in &state.layers {
        check_shape("lstm.w_ih", &[4 * cfg.hidden_size, input_dim], params.w_ih.shape())?;
        check_shape(
            "lstm.w_hh",
            &[4 * cfg.hidden_size, cfg.hidden_size],
            params.w_hh.shape(),
        )?;
        check_shape("lstm.b_ih", &[4 * cfg.hidden_size], params.b_ih.shape())?;
        check_shape("lstm.b_hh", &[4 * cfg.hidden_size], params.b_hh.shape())?;
        check_finite("lstm.w_ih", params.w_ih.iter())?;
        check_finite("lstm.w_hh", params.w_hh.iter())?;
        check_finite("lstm.b_ih", params.b_ih.iter())?;
        check_finite("lstm.b_hh", params.b_hh.iter())?;
        input_dim = cfg.hidden_size;
    }

    check_shape("fc1.w", &[FC1_UNITS, cfg.hidden_size], state.fc1.w.shape())?;
    check_shape("fc2.w", &[FC2_UNITS, FC1_UNITS], state.fc2.w.shape())?;
    check_shape("fc3.w", &[cfg.num_classes, FC2_UNITS], state.fc3.w.shape())?;
    check_shape("fc1.b", &[FC1_UNITS], state.fc1.b.shape())?;
    check_shape("fc2.b", &[FC2_UNITS], state.fc2.b.shape())?;
    check_shape("fc3.b", &[cfg.num_classes], state.fc3.b.shape())?;
    check_finite("fc1.w", state.fc1.w.iter())?;
    check_finite("fc1.b", state.fc1.b.iter())?;
    check_finite("fc2.w", state.fc2.w.iter())?;
    check_finite("fc2.b", state.fc2.b.iter())?;
    check_finite("fc3.w", state.fc3.w.iter())?;
    check_finite("fc3.b", state.fc3.b.iter())?;

    Ok(())
}

fn check_shape(tensor: &'static str, expected: &[usize], got: &[usize]) -> Result<(), NetError> {
    if expected != got {
        return Err(NetError::ShapeMismatch {
            tensor,
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

fn check_finite<'a>(
    tensor: &'static str,
    mut values: impl Iterator<Item = &'a f64>,
) -> Result<(), NetError> {
    if values.any(|v| !v.is_finite()) {
        return Err(NetError::NonFinite(tensor));
    }
    Ok(())
}
