use ndarray::{Array1, Array2, Axis};
use rand::{rngs::SmallRng, Rng};
use serde::{Deserialize, Serialize};

/// Non-linearity applied after every hidden layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `max(0, x)`.
    #[default]
    Relu,
    /// Hyperbolic tangent.
    Tanh,
}

impl Activation {
    fn apply(self, pre: &Array2<f64>) -> Array2<f64> {
        match self {
            Self::Relu => pre.mapv(|value| value.max(0.0)),
            Self::Tanh => pre.mapv(f64::tanh),
        }
    }

    /// Derivative expressed from the pre-activation and the activation output.
    fn derivative(self, pre: &Array2<f64>, post: &Array2<f64>) -> Array2<f64> {
        match self {
            Self::Relu => pre.mapv(|value| if value > 0.0 { 1.0 } else { 0.0 }),
            Self::Tanh => post.mapv(|value| 1.0 - value * value),
        }
    }
}

/// Fully connected layer: `y = x W + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    /// `inputs x outputs` weights.
    pub weights: Array2<f64>,
    /// One bias per output.
    pub bias: Array1<f64>,
}

impl DenseLayer {
    /// Xavier-uniform initialization, zero bias.
    pub fn xavier(inputs: usize, outputs: usize, rng: &mut SmallRng) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(outputs),
        }
    }

    /// Input width.
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    /// Output width.
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

/// Gradient of the loss with respect to one layer's parameters.
#[derive(Debug, Clone)]
pub struct LayerGradient {
    /// Same shape as the layer weights.
    pub weights: Array2<f64>,
    /// Same shape as the layer bias.
    pub bias: Array1<f64>,
}

/// Feed-forward stack: hidden layers use `activation`, the last layer is linear.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<DenseLayer>,
    activation: Activation,
}

impl Network {
    /// Randomly initialized network with the given layer widths.
    ///
    /// `widths` lists input, hidden and output widths, e.g. `[20, 32, 3]`.
    pub fn initialize(widths: &[usize], activation: Activation, rng: &mut SmallRng) -> Self {
        let layers = widths
            .windows(2)
            .map(|pair| DenseLayer::xavier(pair[0], pair[1], rng))
            .collect();
        Self { layers, activation }
    }

    /// Assembles a network from existing layers (used when loading weights).
    #[must_use]
    pub fn from_layers(layers: Vec<DenseLayer>, activation: Activation) -> Self {
        Self { layers, activation }
    }

    /// Layers from input to output.
    #[must_use]
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    /// Hidden-layer activation.
    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Inference pass.
    #[must_use]
    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut current = input.to_owned();
        for (idx, layer) in self.layers.iter().enumerate() {
            let pre = layer.forward(&current);
            current = if idx < last {
                self.activation.apply(&pre)
            } else {
                pre
            };
        }
        current
    }

    /// Mean-squared-error loss and its gradient for one batch.
    pub fn backpropagate(
        &self,
        input: &Array2<f64>,
        target: &Array2<f64>,
    ) -> (f64, Vec<LayerGradient>) {
        let last = self.layers.len().saturating_sub(1);
        // post[i] feeds layer i; pre[i] is layer i's affine output
        let mut post = vec![input.to_owned()];
        let mut pre = Vec::with_capacity(self.layers.len());
        for (idx, layer) in self.layers.iter().enumerate() {
            let affine = layer.forward(&post[idx]);
            let activated = if idx < last {
                self.activation.apply(&affine)
            } else {
                affine.clone()
            };
            pre.push(affine);
            post.push(activated);
        }

        let output = &post[self.layers.len()];
        let loss = mean_squared_error(output, target);
        #[allow(clippy::cast_precision_loss)]
        let scale = 2.0 / output.len().max(1) as f64;
        let mut delta = (output - target) * scale;

        let mut gradients = Vec::with_capacity(self.layers.len());
        for idx in (0..self.layers.len()).rev() {
            gradients.push(LayerGradient {
                weights: post[idx].t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });
            if idx > 0 {
                let upstream = delta.dot(&self.layers[idx].weights.t());
                delta = upstream * self.activation.derivative(&pre[idx - 1], &post[idx]);
            }
        }
        gradients.reverse();
        (loss, gradients)
    }
}

/// Mean of squared differences over every element; 0.0 for empty input.
#[must_use]
pub fn mean_squared_error(predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
    if predictions.is_empty() || predictions.dim() != targets.dim() {
        return 0.0;
    }
    (predictions - targets)
        .mapv(|diff| diff * diff)
        .mean()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn network() -> Network {
        let mut rng = SmallRng::seed_from_u64(7);
        Network::initialize(&[4, 5, 2], Activation::Tanh, &mut rng)
    }

    #[test]
    fn forward_produces_output_width() {
        let net = network();
        let output = net.forward(&Array2::zeros((3, 4)));
        assert_eq!(output.dim(), (3, 2));
        // zero input and zero bias give zero output
        assert!(output.iter().all(|value| value.abs() < 1e-12));
    }

    #[test]
    fn gradients_match_finite_differences() {
        let net = network();
        let input = array![[0.1, -0.4, 0.3, 0.9], [0.5, 0.2, -0.7, 0.05]];
        let target = array![[0.3, 0.8], [0.1, 0.4]];
        let (_, gradients) = net.backpropagate(&input, &target);
        let epsilon = 1e-6;
        for layer in 0..2 {
            for ((row, col), analytic) in gradients[layer].weights.indexed_iter() {
                let mut plus = net.clone();
                plus.layers_mut()[layer].weights[[row, col]] += epsilon;
                let mut minus = net.clone();
                minus.layers_mut()[layer].weights[[row, col]] -= epsilon;
                let numeric = (mean_squared_error(&plus.forward(&input), &target)
                    - mean_squared_error(&minus.forward(&input), &target))
                    / (2.0 * epsilon);
                assert!(
                    (numeric - analytic).abs() < 1e-5,
                    "layer {layer} [{row},{col}]: {numeric} vs {analytic}"
                );
            }
        }
    }

    #[test]
    fn relu_derivative_masks_negative_inputs() {
        let pre = array![[-1.0, 0.0, 2.0]];
        let post = Activation::Relu.apply(&pre);
        assert_eq!(post, array![[0.0, 0.0, 2.0]]);
        assert_eq!(
            Activation::Relu.derivative(&pre, &post),
            array![[0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn mse_ignores_mismatched_shapes() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0, 1.0]];
        assert!((mean_squared_error(&a, &b) - 0.5).abs() < 1e-12);
        assert_eq!(mean_squared_error(&a, &array![[1.0]]), 0.0);
    }
}
