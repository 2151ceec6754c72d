//! Adam optimizer with decoupled bias correction and L2 weight decay.
//!
//! Bias correction is folded into the step size:
//! `lr_t = lr · sqrt(1 - β2^t) / (1 - β1^t)`. Weight decay is added to the
//! raw gradient before the moment updates.

use ndarray::{Array, Dimension};

use super::classifier::{ClassifierConfig, ClassifierGrads, SeverityClassifier};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Adam state over every classifier parameter family.
pub struct Adam {
    /// Current learning rate; the plateau scheduler mutates this in place.
    pub learning_rate: f64,
    weight_decay: f64,
    step_count: usize,
    m: ClassifierGrads,
    v: ClassifierGrads,
}

impl Adam {
    /// Fresh optimizer state for a classifier.
    #[must_use]
    pub fn new(config: &ClassifierConfig, learning_rate: f64, weight_decay: f64) -> Self {
        Self {
            learning_rate,
            weight_decay,
            step_count: 0,
            m: ClassifierGrads::zeros(config),
            v: ClassifierGrads::zeros(config),
        }
    }

    /// Apply one update from averaged batch gradients.
    pub fn step(&mut self, classifier: &mut SeverityClassifier, grads: &ClassifierGrads) {
        self.step_count += 1;
        let t = self.step_count as f64;
        let lr = self.learning_rate * ((1.0 - BETA2.powf(t)).sqrt() / (1.0 - BETA1.powf(t)));
        let wd = self.weight_decay;

        for li in 0..classifier.layers.len() {
            let layer = &mut classifier.layers[li];
            let g = &grads.lstm[li];
            let m = &mut self.m.lstm[li];
            let v = &mut self.v.lstm[li];

            update(&mut layer.params.w_ih, &g.w_ih, &mut m.w_ih, &mut v.w_ih, lr, wd);
            update(&mut layer.params.w_hh, &g.w_hh, &mut m.w_hh, &mut v.w_hh, lr, wd);
            update(&mut layer.params.b_ih, &g.b_ih, &mut m.b_ih, &mut v.b_ih, lr, wd);
            update(&mut layer.params.b_hh, &g.b_hh, &mut m.b_hh, &mut v.b_hh, lr, wd);
        }

        update(
            &mut classifier.fc1.params.w,
            &grads.fc1.w,
            &mut self.m.fc1.w,
            &mut self.v.fc1.w,
            lr,
            wd,
        );
        update(
            &mut classifier.fc1.params.b,
            &grads.fc1.b,
            &mut self.m.fc1.b,
            &mut self.v.fc1.b,
            lr,
            wd,
        );
        update(
            &mut classifier.fc2.params.w,
            &grads.fc2.w,
            &mut self.m.fc2.w,
            &mut self.v.fc2.w,
            lr,
            wd,
        );
        update(
            &mut classifier.fc2.params.b,
            &grads.fc2.b,
            &mut self.m.fc2.b,
            &mut self.v.fc2.b,
            lr,
            wd,
        );
        update(
            &mut classifier.fc3.params.w,
            &grads.fc3.w,
            &mut self.m.fc3.w,
            &mut self.v.fc3.w,
            lr,
            wd,
        );
        update(
            &mut classifier.fc3.params.b,
            &grads.fc3.b,
            &mut self.m.fc3.b,
            &mut self.v.fc3.b,
            lr,
            wd,
        );
    }
}

fn update<D: Dimension>(
    params: &mut Array<f64, D>,
    grads: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    lr: f64,
    wd: f64,
) {
    for (((p, g), mi), vi) in params
        .iter_mut()
        .zip(grads.iter())
        .zip(m.iter_mut())
        .zip(v.iter_mut())
    {
        let grad = *g + wd * *p;
        *mi = BETA1 * *mi + (1.0 - BETA1) * grad;
        *vi = BETA2 * *vi + (1.0 - BETA2) * grad * grad;
        *p -= lr * *mi / ((*vi).sqrt() + EPSILON);
    }
}
