//! One LSTM layer with full-sequence backpropagation through time.
//!
//! Weight layout follows the stacked `[i f g o]` gate convention: `w_ih` is
//! `[4H, in]`, `w_hh` is `[4H, H]`. Each forward pass starts from zero
//! hidden/cell state and records a per-timestep tape consumed by `backward`.

use ndarray::{s, Array1, Array2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sigmoid;

/// Learnable parameters of one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmParams {
    /// Input-to-hidden weights, `[4H, in]`.
    pub w_ih: Array2<f64>,
    /// Hidden-to-hidden weights, `[4H, H]`.
    pub w_hh: Array2<f64>,
    /// Input-side gate biases, `[4H]`.
    pub b_ih: Array1<f64>,
    /// Hidden-side gate biases, `[4H]`.
    pub b_hh: Array1<f64>,
}

/// Parameter gradients, same shapes as [`LstmParams`].
#[derive(Debug, Clone)]
pub struct LstmGrads {
    pub w_ih: Array2<f64>,
    pub w_hh: Array2<f64>,
    pub b_ih: Array1<f64>,
    pub b_hh: Array1<f64>,
}

impl LstmGrads {
    #[must_use]
    pub fn zeros(input_dim: usize, hidden: usize) -> Self {
        Self {
            w_ih: Array2::zeros((4 * hidden, input_dim)),
            w_hh: Array2::zeros((4 * hidden, hidden)),
            b_ih: Array1::zeros(4 * hidden),
            b_hh: Array1::zeros(4 * hidden),
        }
    }

    pub fn accumulate(&mut self, other: &Self) {
        self.w_ih += &other.w_ih;
        self.w_hh += &other.w_hh;
        self.b_ih += &other.b_ih;
        self.b_hh += &other.b_hh;
    }

    pub fn scale(&mut self, factor: f64) {
        self.w_ih *= factor;
        self.w_hh *= factor;
        self.b_ih *= factor;
        self.b_hh *= factor;
    }
}

/// Cached activations for one timestep.
#[derive(Debug, Clone)]
struct StepTape {
    x: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    c: Array1<f64>,
    h: Array1<f64>,
}

/// One LSTM layer.
#[derive(Debug, Clone)]
pub struct LstmLayer {
    pub params: LstmParams,
    input_dim: usize,
    hidden: usize,
    tape: Vec<StepTape>,
}

impl LstmLayer {
    /// Create a layer with Xavier-style uniform initialization.
    #[must_use]
    pub fn new(input_dim: usize, hidden: usize, rng: &mut impl Rng) -> Self {
        let std = (2.0 / (input_dim + hidden) as f64).sqrt();
        let dist = Uniform::new(-std, std);

        let params = LstmParams {
            w_ih: Array2::from_shape_fn((4 * hidden, input_dim), |_| dist.sample(rng)),
            w_hh: Array2::from_shape_fn((4 * hidden, hidden), |_| dist.sample(rng)),
            b_ih: Array1::zeros(4 * hidden),
            b_hh: Array1::zeros(4 * hidden),
        };

        Self {
            params,
            input_dim,
            hidden,
            tape: Vec::new(),
        }
    }

    /// Rebuild a layer from saved parameters. Shapes are the caller's
    /// responsibility; the classifier validates them on load.
    #[must_use]
    pub fn from_params(params: LstmParams) -> Self {
        let input_dim = params.w_ih.ncols();
        let hidden = params.w_hh.ncols();
        Self {
            params,
            input_dim,
            hidden,
            tape: Vec::new(),
        }
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[must_use]
    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// Run the whole sequence from zero state, caching the tape.
    ///
    /// Returns the hidden state at every timestep.
    pub fn forward(&mut self, inputs: &[Array1<f64>]) -> Vec<Array1<f64>> {
        self.tape.clear();
        self.tape.reserve(inputs.len());

        let mut h = Array1::zeros(self.hidden);
        let mut c: Array1<f64> = Array1::zeros(self.hidden);
        let mut outputs = Vec::with_capacity(inputs.len());

        for x in inputs {
            let gates = self.params.w_ih.dot(x)
                + &self.params.b_ih
                + self.params.w_hh.dot(&h)
                + &self.params.b_hh;

            let hsz = self.hidden;
            let i = gates.slice(s![0..hsz]).to_owned().mapv(sigmoid);
            let f = gates.slice(s![hsz..2 * hsz]).to_owned().mapv(sigmoid);
            let g = gates.slice(s![2 * hsz..3 * hsz]).to_owned().mapv(f64::tanh);
            let o = gates.slice(s![3 * hsz..4 * hsz]).to_owned().mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let h_next = &o * &c_next.mapv(f64::tanh);

            self.tape.push(StepTape {
                x: x.clone(),
                i,
                f,
                g,
                o,
                c: c_next.clone(),
                h: h_next.clone(),
            });

            c = c_next;
            h = h_next.clone();
            outputs.push(h_next);
        }

        outputs
    }

    /// Backpropagate through the taped sequence.
    ///
    /// `dh_seq[t]` is the loss gradient flowing into the hidden output at
    /// timestep `t`. Returns parameter gradients and the per-timestep input
    /// gradients for the layer below.
    pub fn backward(&self, dh_seq: &[Array1<f64>]) -> (LstmGrads, Vec<Array1<f64>>) {
        let steps = self.tape.len();
        let mut grads = LstmGrads::zeros(self.input_dim, self.hidden);
        let mut dx_seq = vec![Array1::zeros(self.input_dim); steps];

        let mut dh_rec: Array1<f64> = Array1::zeros(self.hidden);
        let mut dc_rec: Array1<f64> = Array1::zeros(self.hidden);

        for t in (0..steps).rev() {
            let st = &self.tape[t];
            let dh = if t < dh_seq.len() {
                &dh_seq[t] + &dh_rec
            } else {
                dh_rec.clone()
            };

            let tanh_c = st.c.mapv(f64::tanh);
            let d_o = &dh * &tanh_c * &st.o.mapv(|v| v * (1.0 - v));
            let dc = &dh * &st.o * &tanh_c.mapv(|v| 1.0 - v * v) + &dc_rec;

            let c_prev = self.prev_c(t);
            let h_prev = self.prev_h(t);

            let d_i = &dc * &st.g * &st.i.mapv(|v| v * (1.0 - v));
            let d_f = &dc * &c_prev * &st.f.mapv(|v| v * (1.0 - v));
            let d_g = &dc * &st.i * &st.g.mapv(|v| 1.0 - v * v);

            let hsz = self.hidden;
            let mut gate_grads = Array1::zeros(4 * hsz);
            gate_grads.slice_mut(s![0..hsz]).assign(&d_i);
            gate_grads.slice_mut(s![hsz..2 * hsz]).assign(&d_f);
            gate_grads.slice_mut(s![2 * hsz..3 * hsz]).assign(&d_g);
            gate_grads.slice_mut(s![3 * hsz..4 * hsz]).assign(&d_o);

            let gg_col = gate_grads.view().insert_axis(Axis(1));
            let x_col = st.x.view().insert_axis(Axis(1));
            let hprev_col = h_prev.view().insert_axis(Axis(1));

            grads.w_ih += &gg_col.dot(&x_col.t());
            grads.w_hh += &gg_col.dot(&hprev_col.t());
            grads.b_ih += &gate_grads;
            grads.b_hh += &gate_grads;

            dx_seq[t] = self.params.w_ih.t().dot(&gate_grads);
            dh_rec = self.params.w_hh.t().dot(&gate_grads);
            dc_rec = &dc * &st.f;
        }

        (grads, dx_seq)
    }

    fn prev_h(&self, t: usize) -> Array1<f64> {
        if t == 0 {
            Array1::zeros(self.hidden)
        } else {
            self.tape[t - 1].h.clone()
        }
    }

    fn prev_c(&self, t: usize) -> Array1<f64> {
        if t == 0 {
            Array1::zeros(self.hidden)
        } else {
            self.tape[t - 1].c.clone()
        }
    }
}
