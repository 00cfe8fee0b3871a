use ndarray::{Array, Array1, Array2, Dimension, Zip};
use serde::{Deserialize, Serialize};

use crate::network::{LayerGradient, Network};

/// Update rule bound to a model at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// Plain minibatch gradient descent.
    Sgd,
    /// Adam with the usual defaults (beta1 0.9, beta2 0.999).
    #[default]
    Adam,
}

/// Loss minimized during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// Mean squared error over the three output dimensions.
    #[default]
    MeanSquaredError,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
struct Moments {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// Optimizer state carried across steps.
#[derive(Debug, Clone)]
pub struct Optimizer {
    kind: OptimizerKind,
    learning_rate: f64,
    step: i32,
    first: Vec<Moments>,
    second: Vec<Moments>,
}

impl Optimizer {
    /// Fresh state sized for `network`.
    #[must_use]
    pub fn new(kind: OptimizerKind, learning_rate: f64, network: &Network) -> Self {
        let zeros = || {
            network
                .layers()
                .iter()
                .map(|layer| Moments {
                    weights: Array2::zeros(layer.weights.dim()),
                    bias: Array1::zeros(layer.bias.len()),
                })
                .collect::<Vec<_>>()
        };
        let (first, second) = match kind {
            OptimizerKind::Sgd => (Vec::new(), Vec::new()),
            OptimizerKind::Adam => (zeros(), zeros()),
        };
        Self {
            kind,
            learning_rate,
            step: 0,
            first,
            second,
        }
    }

    /// Configured update rule.
    #[must_use]
    pub const fn kind(&self) -> OptimizerKind {
        self.kind
    }

    /// Configured step size.
    #[must_use]
    pub const fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Applies one update with the given per-layer gradients.
    pub fn apply(&mut self, network: &mut Network, gradients: &[LayerGradient]) {
        self.step = self.step.saturating_add(1);
        match self.kind {
            OptimizerKind::Sgd => {
                for (layer, grad) in network.layers_mut().iter_mut().zip(gradients) {
                    layer.weights.scaled_add(-self.learning_rate, &grad.weights);
                    layer.bias.scaled_add(-self.learning_rate, &grad.bias);
                }
            }
            OptimizerKind::Adam => {
                let correction1 = 1.0 - BETA1.powi(self.step);
                let correction2 = 1.0 - BETA2.powi(self.step);
                let lr = self.learning_rate;
                let layers = network.layers_mut().iter_mut();
                let state = self.first.iter_mut().zip(self.second.iter_mut());
                for ((layer, grad), (m, v)) in layers.zip(gradients).zip(state) {
                    m.weights = &m.weights * BETA1 + &grad.weights * (1.0 - BETA1);
                    v.weights = &v.weights * BETA2 + grad.weights.mapv(|g| g * g) * (1.0 - BETA2);
                    m.bias = &m.bias * BETA1 + &grad.bias * (1.0 - BETA1);
                    v.bias = &v.bias * BETA2 + grad.bias.mapv(|g| g * g) * (1.0 - BETA2);
                    layer.weights -= &adam_step(&m.weights, &v.weights, lr, correction1, correction2);
                    layer.bias -= &adam_step(&m.bias, &v.bias, lr, correction1, correction2);
                }
            }
        }
    }
}

fn adam_step<D: Dimension>(
    first: &Array<f64, D>,
    second: &Array<f64, D>,
    lr: f64,
    correction1: f64,
    correction2: f64,
) -> Array<f64, D> {
    Zip::from(first).and(second).map_collect(|m, v| {
        lr * (m / correction1) / ((v / correction2).sqrt() + EPSILON)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{mean_squared_error, Activation};
    use ndarray::array;
    use rand::{rngs::SmallRng, SeedableRng};

    fn fit(kind: OptimizerKind, lr: f64, steps: usize) -> (f64, f64) {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut net = Network::initialize(&[2, 6, 1], Activation::Tanh, &mut rng);
        let input = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let target = array![[0.1], [0.5], [0.5], [0.9]];
        let before = mean_squared_error(&net.forward(&input), &target);
        let mut optimizer = Optimizer::new(kind, lr, &net);
        for _ in 0..steps {
            let (_, grads) = net.backpropagate(&input, &target);
            optimizer.apply(&mut net, &grads);
        }
        (before, mean_squared_error(&net.forward(&input), &target))
    }

    #[test]
    fn sgd_reduces_loss() {
        let (before, after) = fit(OptimizerKind::Sgd, 0.1, 300);
        assert!(after < before, "{after} !< {before}");
    }

    #[test]
    fn adam_reduces_loss() {
        let (before, after) = fit(OptimizerKind::Adam, 0.01, 300);
        assert!(after < before * 0.5, "{after} vs {before}");
    }
}
