//! Weighted softmax cross-entropy.

use ndarray::Array1;

use crate::domain::SEVERITY_BIN_COUNT;

/// Numerically stable softmax.
#[must_use]
pub fn softmax(logits: &Array1<f64>) -> Array1<f64> {
    let max = logits.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let exps = logits.mapv(|v| (v - max).exp());
    let sum = exps.sum();
    exps / sum
}

/// Index of the largest entry; 0 for an empty array.
#[must_use]
pub fn argmax(values: &Array1<f64>) -> usize {
    let mut best = 0;
    for i in 1..values.len() {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

/// Softmax cross-entropy with per-class weights.
///
/// Per sample: `loss = -w_y · ln p_y`, `d loss / d logits = w_y · (p - 1_y)`.
/// Batch reduction (dividing by the summed target weights, matching the
/// weighted-mean convention) is the trainer's job.
#[derive(Debug, Clone)]
pub struct WeightedCrossEntropy {
    weights: [f64; SEVERITY_BIN_COUNT],
}

impl WeightedCrossEntropy {
    #[must_use]
    pub fn new(weights: [f64; SEVERITY_BIN_COUNT]) -> Self {
        Self { weights }
    }

    /// Weight of a target class.
    #[must_use]
    pub fn weight(&self, target: usize) -> f64 {
        self.weights.get(target).copied().unwrap_or(0.0)
    }

    /// Loss and logit gradient for one sample.
    #[must_use]
    pub fn loss_and_grad(&self, logits: &Array1<f64>, target: usize) -> (f64, Array1<f64>) {
        let probs = softmax(logits);
        let w = self.weight(target);

        let p_target = probs[target].max(1e-12);
        let loss = -w * p_target.ln();

        let mut grad = probs * w;
        grad[target] -= w;
        (loss, grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
        assert!((probs.sum() - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_softmax_is_shift_invariant_and_stable() {
        let a = softmax(&Array1::from_vec(vec![1.0, 2.0, 3.0]));
        let b = softmax(&Array1::from_vec(vec![1001.0, 1002.0, 1003.0]));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_uniform_logits_give_expected_loss() {
        let criterion = WeightedCrossEntropy::new([0.1, 0.15, 0.2, 0.25, 0.3]);
        let logits = Array1::zeros(5);

        let (loss, _) = criterion.loss_and_grad(&logits, 4);
        let expected = -0.3 * (0.2f64).ln();
        assert!((loss - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_sums_to_zero() {
        let criterion = WeightedCrossEntropy::new([0.2; 5]);
        let logits = Array1::from_vec(vec![0.3, -1.0, 2.0, 0.0, 0.5]);

        let (_, grad) = criterion.loss_and_grad(&logits, 2);
        assert!(grad.sum().abs() < 1e-12);
        assert!(grad[2] < 0.0, "target logit gradient must be negative");
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let criterion = WeightedCrossEntropy::new([0.1, 0.15, 0.2, 0.25, 0.3]);
        let logits = Array1::from_vec(vec![0.4, -0.2, 1.3, 0.0, -0.9]);
        let (_, grad) = criterion.loss_and_grad(&logits, 3);

        let eps = 1e-6;
        for k in 0..5 {
            let mut up = logits.clone();
            up[k] += eps;
            let mut down = logits.clone();
            down[k] -= eps;
            let numeric = (criterion.loss_and_grad(&up, 3).0
                - criterion.loss_and_grad(&down, 3).0)
                / (2.0 * eps);
            assert!(
                (numeric - grad[k]).abs() < 1e-8,
                "logit {k}: numeric {numeric} vs analytic {}",
                grad[k]
            );
        }
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&Array1::from_vec(vec![0.1, 0.9, 0.5])), 1);
        assert_eq!(argmax(&Array1::from_vec(vec![2.0, 1.0])), 0);
    }
}
