//! Fully-connected layers and dropout masks for the classification head.

use ndarray::{Array1, Array2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Learnable parameters of one dense layer, `w` is `[out, in]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseParams {
    pub w: Array2<f64>,
    pub b: Array1<f64>,
}

/// Parameter gradients, same shapes as [`DenseParams`].
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub w: Array2<f64>,
    pub b: Array1<f64>,
}

impl DenseGrads {
    #[must_use]
    pub fn zeros(input_dim: usize, output_dim: usize) -> Self {
        Self {
            w: Array2::zeros((output_dim, input_dim)),
            b: Array1::zeros(output_dim),
        }
    }

    pub fn accumulate(&mut self, other: &Self) {
        self.w += &other.w;
        self.b += &other.b;
    }

    pub fn scale(&mut self, factor: f64) {
        self.w *= factor;
        self.b *= factor;
    }
}

/// One dense layer; the last forward input is cached for backprop.
#[derive(Debug, Clone)]
pub struct Dense {
    pub params: DenseParams,
    input: Array1<f64>,
}

impl Dense {
    /// Create a layer with Xavier-style uniform initialization.
    #[must_use]
    pub fn new(input_dim: usize, output_dim: usize, rng: &mut impl Rng) -> Self {
        let std = (2.0 / (input_dim + output_dim) as f64).sqrt();
        let dist = Uniform::new(-std, std);

        Self {
            params: DenseParams {
                w: Array2::from_shape_fn((output_dim, input_dim), |_| dist.sample(rng)),
                b: Array1::zeros(output_dim),
            },
            input: Array1::zeros(input_dim),
        }
    }

    /// Rebuild a layer from saved parameters.
    #[must_use]
    pub fn from_params(params: DenseParams) -> Self {
        let input_dim = params.w.ncols();
        Self {
            params,
            input: Array1::zeros(input_dim),
        }
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.params.w.ncols()
    }

    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.params.w.nrows()
    }

    /// `w·x + b`, caching `x` for the next backward call.
    pub fn forward(&mut self, x: &Array1<f64>) -> Array1<f64> {
        self.input = x.clone();
        self.params.w.dot(x) + &self.params.b
    }

    /// Gradients for the last forward input, plus the gradient flowing to it.
    pub fn backward(&self, dy: &Array1<f64>) -> (DenseGrads, Array1<f64>) {
        let dy_col = dy.view().insert_axis(Axis(1));
        let x_col = self.input.view().insert_axis(Axis(1));

        let grads = DenseGrads {
            w: dy_col.dot(&x_col.t()),
            b: dy.clone(),
        };
        let dx = self.params.w.t().dot(dy);
        (grads, dx)
    }
}

/// Inverted dropout mask: surviving units are scaled by `1/keep` so the
/// expected activation is unchanged; eval mode uses an all-ones mask.
#[must_use]
pub fn dropout_mask(dim: usize, dropout: f64, rng: &mut impl Rng) -> Array1<f64> {
    let keep = 1.0 - dropout;
    Array1::from_shape_fn(dim, |_| {
        if rng.gen::<f64>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}
