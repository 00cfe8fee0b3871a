//! Next-track mood regressor: a small feed-forward network mapping one
//! encoded track (20 features) to the next track's valence, energy and
//! danceability.
//!
//! Lifecycle mirrors the usual build -> compile -> train -> predict flow.
//! Outputs are raw network values; callers clamp them for presentation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use ndarray::{Array1, Array2};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    batch::BatchBuilder,
    codec::TARGET_DIM,
    dataset::ExampleSet,
    error::{MoodError, MoodResult, PersistenceError},
    features::FEATURE_DIM,
    history::{EpochRecord, TrainingHistory},
    network::{mean_squared_error, Activation, DenseLayer, Network},
    optimizer::{Loss, Optimizer, OptimizerKind},
};

/// Version written into model files.
pub const FORMAT_VERSION: u32 = 1;

/// Validation loss must drop by more than this to reset early-stopping patience.
pub const MIN_IMPROVEMENT: f64 = 1e-9;

/// Layer widths and activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTopology {
    /// Input width (20 for encoded tracks).
    pub input_dim: usize,
    /// Hidden layer widths, input side first.
    pub hidden_dims: Vec<usize>,
    /// Output width (3 mood dimensions).
    pub output_dim: usize,
    /// Hidden-layer activation.
    pub activation: Activation,
}

impl Default for ModelTopology {
    fn default() -> Self {
        Self {
            input_dim: FEATURE_DIM,
            hidden_dims: vec![32, 16],
            output_dim: TARGET_DIM,
            activation: Activation::Relu,
        }
    }
}

impl ModelTopology {
    fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::with_capacity(self.hidden_dims.len() + 2);
        widths.push(self.input_dim);
        widths.extend(&self.hidden_dims);
        widths.push(self.output_dim);
        widths
    }

    fn validate(&self) -> MoodResult<()> {
        if self.widths().contains(&0) {
            return Err(MoodError::Config(format!(
                "layer widths must be positive, got {:?}",
                self.widths()
            )));
        }
        Ok(())
    }
}

/// Epoch budget and batching for one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Maximum number of epochs.
    pub epochs: usize,
    /// Minibatch size.
    pub batch_size: usize,
    /// Stop after this many epochs without validation improvement; `None` runs the full budget.
    pub patience: Option<usize>,
    /// Shuffle seed; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            patience: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Compilation {
    optimizer: Optimizer,
    loss: Loss,
}

/// Trainable next-track mood regressor.
#[derive(Debug, Clone)]
pub struct MoodModel {
    topology: ModelTopology,
    network: Network,
    compiled: Option<Compilation>,
}

impl MoodModel {
    /// Allocates a randomly initialized network for `topology`.
    pub fn build(topology: ModelTopology, seed: Option<u64>) -> MoodResult<Self> {
        topology.validate()?;
        let mut rng = seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
        let network = Network::initialize(&topology.widths(), topology.activation, &mut rng);
        Ok(Self {
            topology,
            network,
            compiled: None,
        })
    }

    /// Binds an optimizer and the mean-squared-error loss.
    ///
    /// Recompiling resets optimizer state but keeps the weights.
    pub fn compile(&mut self, optimizer: OptimizerKind, learning_rate: f64) -> MoodResult<()> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(MoodError::Config(format!(
                "learning rate must be positive, got {learning_rate}"
            )));
        }
        self.compiled = Some(Compilation {
            optimizer: Optimizer::new(optimizer, learning_rate, &self.network),
            loss: Loss::MeanSquaredError,
        });
        Ok(())
    }

    /// True once [`compile`](Self::compile) succeeded.
    #[must_use]
    pub const fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Layer widths and activation.
    #[must_use]
    pub const fn topology(&self) -> &ModelTopology {
        &self.topology
    }

    /// Underlying network.
    #[must_use]
    pub const fn network(&self) -> &Network {
        &self.network
    }

    /// Minibatch training with per-epoch shuffling.
    pub fn train(
        &mut self,
        train: &ExampleSet,
        validation: &ExampleSet,
        options: &TrainOptions,
    ) -> MoodResult<TrainingHistory> {
        self.train_with_progress(train, validation, options, |_| {})
    }

    /// Like [`train`](Self::train), calling `on_epoch` after every epoch.
    pub fn train_with_progress<F>(
        &mut self,
        train: &ExampleSet,
        validation: &ExampleSet,
        options: &TrainOptions,
        mut on_epoch: F,
    ) -> MoodResult<TrainingHistory>
    where
        F: FnMut(&EpochRecord),
    {
        self.check_set(train, "training")?;
        self.check_set(validation, "validation")?;
        if train.is_empty() {
            return Err(MoodError::TrainingDataInsufficient {
                found: 0,
                required: 1,
            });
        }
        let compiled = self.compiled.as_mut().ok_or(MoodError::NotCompiled)?;
        let Loss::MeanSquaredError = compiled.loss;

        let mut rng = options
            .seed
            .map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
        let mut batches = BatchBuilder::new(train.len(), options.batch_size);
        let mut history = TrainingHistory::default();
        let mut best: Option<(f64, Network)> = None;
        let mut stale_epochs = 0;

        for epoch in 0..options.epochs {
            let mut weighted_loss = 0.0;
            for batch in batches.epoch(&train.inputs, &train.targets, &mut rng) {
                let (loss, gradients) = self.network.backpropagate(&batch.inputs, &batch.targets);
                #[allow(clippy::cast_precision_loss)]
                let rows = batch.inputs.nrows() as f64;
                weighted_loss += loss * rows;
                compiled.optimizer.apply(&mut self.network, &gradients);
            }
            #[allow(clippy::cast_precision_loss)]
            let train_loss = weighted_loss / train.len() as f64;
            let val_loss = (!validation.is_empty()).then(|| {
                mean_squared_error(&self.network.forward(&validation.inputs), &validation.targets)
            });
            let record = EpochRecord {
                epoch,
                train_loss,
                val_loss,
            };
            history.epochs.push(record);
            on_epoch(&record);

            let (Some(patience), Some(val_loss)) = (options.patience, val_loss) else {
                continue;
            };
            match &best {
                Some((best_loss, _)) if val_loss >= best_loss - MIN_IMPROVEMENT => {
                    stale_epochs += 1;
                    if stale_epochs >= patience.max(1) {
                        history.stopped_early = true;
                        break;
                    }
                }
                _ => {
                    best = Some((val_loss, self.network.clone()));
                    stale_epochs = 0;
                }
            }
        }

        if let Some((_, network)) = best {
            self.network = network;
        }
        Ok(history)
    }

    fn check_set(&self, set: &ExampleSet, label: &str) -> MoodResult<()> {
        let (inputs, targets) = (set.inputs.ncols(), set.targets.ncols());
        if inputs != self.topology.input_dim || targets != self.topology.output_dim {
            return Err(MoodError::Shape(format!(
                "{label} set is {inputs}->{targets}, model is {}->{}",
                self.topology.input_dim, self.topology.output_dim
            )));
        }
        if set.inputs.nrows() != set.targets.nrows() {
            return Err(MoodError::Shape(format!(
                "{label} set has {} inputs but {} targets",
                set.inputs.nrows(),
                set.targets.nrows()
            )));
        }
        Ok(())
    }

    /// Batched inference: `n x input_dim` in, `n x output_dim` out.
    pub fn predict(&self, inputs: &Array2<f64>) -> MoodResult<Array2<f64>> {
        if inputs.ncols() != self.topology.input_dim {
            return Err(MoodError::Shape(format!(
                "expected {} input columns, got {}",
                self.topology.input_dim,
                inputs.ncols()
            )));
        }
        Ok(self.network.forward(inputs))
    }

    /// Writes topology and weights as JSON.
    ///
    /// The document is written next to `path` and renamed into place, so a
    /// failed save leaves any previous file intact.
    pub fn save(&self, path: impl AsRef<Path>) -> MoodResult<()> {
        let path = path.as_ref();
        let io_err = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let document = ModelDocument::from_model(self);
        let bytes =
            serde_json::to_vec_pretty(&document).map_err(|source| PersistenceError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        let staging = staging_path(path);
        fs::write(&staging, bytes).map_err(io_err)?;
        fs::rename(&staging, path).map_err(io_err)?;
        Ok(())
    }

    /// Restores a model saved by [`save`](Self::save).
    ///
    /// Fails with a dimension mismatch when the file was trained for a
    /// different input width than `expected_input_dim`. The loaded model is
    /// not compiled.
    pub fn load(path: impl AsRef<Path>, expected_input_dim: usize) -> MoodResult<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: ModelDocument =
            serde_json::from_slice(&raw).map_err(|source| PersistenceError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(document.into_model(expected_input_dim)?)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    format_version: u32,
    input_dim: usize,
    output_dim: usize,
    hidden_dims: Vec<usize>,
    activation: Activation,
    layers: Vec<LayerDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerDocument {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl ModelDocument {
    fn from_model(model: &MoodModel) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            input_dim: model.topology.input_dim,
            output_dim: model.topology.output_dim,
            hidden_dims: model.topology.hidden_dims.clone(),
            activation: model.topology.activation,
            layers: model
                .network
                .layers()
                .iter()
                .map(|layer| LayerDocument {
                    inputs: layer.inputs(),
                    outputs: layer.outputs(),
                    weights: layer.weights.iter().copied().collect(),
                    bias: layer.bias.to_vec(),
                })
                .collect(),
        }
    }

    fn into_model(self, expected_input_dim: usize) -> Result<MoodModel, PersistenceError> {
        if self.format_version != FORMAT_VERSION {
            return Err(PersistenceError::Version(self.format_version));
        }
        if self.input_dim != expected_input_dim {
            return Err(PersistenceError::DimensionMismatch {
                expected: expected_input_dim,
                found: self.input_dim,
            });
        }
        let topology = ModelTopology {
            input_dim: self.input_dim,
            hidden_dims: self.hidden_dims,
            output_dim: self.output_dim,
            activation: self.activation,
        };
        let widths = topology.widths();
        if self.layers.len() + 1 != widths.len() {
            return Err(PersistenceError::Shape {
                layer: self.layers.len(),
                reason: format!(
                    "expected {} layers for widths {widths:?}",
                    widths.len() - 1
                ),
            });
        }
        let mut layers = Vec::with_capacity(self.layers.len());
        for (idx, layer) in self.layers.into_iter().enumerate() {
            let (inputs, outputs) = (widths[idx], widths[idx + 1]);
            if layer.inputs != inputs || layer.outputs != outputs {
                return Err(PersistenceError::Shape {
                    layer: idx,
                    reason: format!(
                        "declared {}x{}, topology needs {inputs}x{outputs}",
                        layer.inputs, layer.outputs
                    ),
                });
            }
            if layer.bias.len() != outputs {
                return Err(PersistenceError::Shape {
                    layer: idx,
                    reason: format!("bias has {} values, expected {outputs}", layer.bias.len()),
                });
            }
            let weights = Array2::from_shape_vec((inputs, outputs), layer.weights).map_err(
                |err| PersistenceError::Shape {
                    layer: idx,
                    reason: err.to_string(),
                },
            )?;
            layers.push(DenseLayer {
                weights,
                bias: Array1::from(layer.bias),
            });
        }
        Ok(MoodModel {
            network: Network::from_layers(layers, topology.activation),
            topology,
            compiled: None,
        })
    }
}
