use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Duration;
use moodcast_telemetry::LogLevel;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MoodError, MoodResult},
    model::{ModelTopology, TrainOptions},
    network::Activation,
    optimizer::OptimizerKind,
    predictions::ConfidencePolicy,
    session::SessionStrategy,
};

/// Top-level TOML document for training and analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodcastConfig {
    /// Network shape and optimizer.
    #[serde(default)]
    pub model: ModelSettings,
    /// Epoch budget and data split.
    #[serde(default)]
    pub training: TrainingSettings,
    /// Session segmentation.
    #[serde(default)]
    pub session: SessionSettings,
    /// Serving-side knobs.
    #[serde(default)]
    pub analysis: AnalysisSettings,
    /// File locations.
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(skip)]
    source_dir: PathBuf,
}

impl MoodcastConfig {
    /// Loads and validates a TOML file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> MoodResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| MoodError::Config(format!("reading {}: {err}", path.display())))?;
        let mut config = Self::from_toml_str(&raw)
            .map_err(|err| MoodError::Config(format!("{}: {err}", path.display())))?;
        config.source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.paths.resolve_against(&config.source_dir);
        Ok(config)
    }

    /// Parses and validates a TOML document; paths stay as written.
    pub fn from_toml_str(raw: &str) -> MoodResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|err| MoodError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make training or serving meaningless.
    pub fn validate(&self) -> MoodResult<()> {
        let fail = |msg: String| Err(MoodError::Config(msg));
        if self.model.hidden_dims.is_empty() || self.model.hidden_dims.contains(&0) {
            return fail(format!(
                "model.hidden_dims must be non-empty and positive, got {:?}",
                self.model.hidden_dims
            ));
        }
        if !self.model.learning_rate.is_finite() || self.model.learning_rate <= 0.0 {
            return fail(format!(
                "model.learning_rate must be positive, got {}",
                self.model.learning_rate
            ));
        }
        if self.training.epochs == 0 {
            return fail("training.epochs must be at least 1".to_owned());
        }
        if self.training.batch_size == 0 {
            return fail("training.batch_size must be at least 1".to_owned());
        }
        let fraction = self.training.validation_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return fail(format!(
                "training.validation_fraction must lie in (0, 1), got {fraction}"
            ));
        }
        if self.training.min_session_size < 2 {
            return fail(format!(
                "training.min_session_size must be at least 2, got {}",
                self.training.min_session_size
            ));
        }
        if self.session.chunk_size == 0 {
            return fail("session.chunk_size must be at least 1".to_owned());
        }
        if self.session.max_gap_minutes < 0 {
            return fail("session.max_gap_minutes must not be negative".to_owned());
        }
        if Duration::try_minutes(self.session.max_gap_minutes).is_none() {
            return fail(format!(
                "session.max_gap_minutes is out of range, got {}",
                self.session.max_gap_minutes
            ));
        }
        if let ConfidencePolicy::Fixed { mood, next_track } = self.analysis.confidence {
            if !(0.0..=1.0).contains(&mood) || !(0.0..=1.0).contains(&next_track) {
                return fail(format!(
                    "analysis.confidence scores must lie in [0, 1], got mood={mood} next_track={next_track}"
                ));
            }
        }
        Ok(())
    }

    /// Resolves a path relative to the configuration file.
    #[must_use]
    pub fn resolve_path(&self, candidate: impl AsRef<Path>) -> PathBuf {
        let candidate = candidate.as_ref();
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.source_dir.join(candidate)
        }
    }

    /// Topology implied by the model settings.
    #[must_use]
    pub fn topology(&self) -> ModelTopology {
        ModelTopology {
            hidden_dims: self.model.hidden_dims.clone(),
            activation: self.model.activation,
            ..ModelTopology::default()
        }
    }

    /// Training options implied by the training settings.
    #[must_use]
    pub const fn train_options(&self) -> TrainOptions {
        TrainOptions {
            epochs: self.training.epochs,
            batch_size: self.training.batch_size,
            patience: self.training.patience,
            seed: self.model.seed,
        }
    }
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Hidden layer widths.
    #[serde(default = "default_hidden_dims")]
    pub hidden_dims: Vec<usize>,
    /// Hidden activation.
    #[serde(default)]
    pub activation: Activation,
    /// Update rule.
    #[serde(default)]
    pub optimizer: OptimizerKind,
    /// Step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Seed for weight init and shuffling; unset draws from entropy.
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            hidden_dims: default_hidden_dims(),
            activation: Activation::default(),
            optimizer: OptimizerKind::default(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }
}

/// `[training]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Epoch budget.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Minibatch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Tail share of examples held out for validation.
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    /// Sessions shorter than this are dropped.
    #[serde(default = "default_min_session_size")]
    pub min_session_size: usize,
    /// Early-stopping patience; unset trains the full budget.
    #[serde(default)]
    pub patience: Option<usize>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            validation_fraction: default_validation_fraction(),
            min_session_size: default_min_session_size(),
            patience: None,
        }
    }
}

/// Session strategy name in `[session]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    /// Split on listening gaps.
    #[default]
    Gap,
    /// Fixed-size chunks.
    Chunk,
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Which strategy to use.
    #[serde(default)]
    pub strategy: StrategyName,
    /// Gap threshold for `gap`.
    #[serde(default = "default_max_gap_minutes")]
    pub max_gap_minutes: i64,
    /// Chunk length for `chunk`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyName::default(),
            max_gap_minutes: default_max_gap_minutes(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl SessionSettings {
    /// Strategy value handed to the session builder.
    #[must_use]
    pub const fn strategy(&self) -> SessionStrategy {
        match self.strategy {
            StrategyName::Gap => SessionStrategy::Gap {
                max_gap_minutes: self.max_gap_minutes,
            },
            StrategyName::Chunk => SessionStrategy::Chunk {
                size: self.chunk_size,
            },
        }
    }
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Length of the returned pattern embedding.
    #[serde(default = "default_embedding_len")]
    pub embedding_len: usize,
    /// Default for requests that do not say whether they want insights.
    #[serde(default = "default_true")]
    pub include_insights: bool,
    /// Confidence scoring.
    #[serde(default)]
    pub confidence: ConfidencePolicy,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            embedding_len: default_embedding_len(),
            include_insights: true,
            confidence: ConfidencePolicy::default(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// JSONL track corpus.
    #[serde(default = "default_corpus_path")]
    pub corpus: PathBuf,
    /// Model weights file.
    #[serde(default = "default_model_path")]
    pub model: PathBuf,
    /// JSONL log; unset disables logging.
    #[serde(default)]
    pub log: Option<PathBuf>,
    /// Minimum level written to `log`.
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    /// JSONL event log; unset disables events.
    #[serde(default)]
    pub event_log: Option<PathBuf>,
    /// JSONL run manifest.
    #[serde(default = "default_manifest_path")]
    pub manifest: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            corpus: default_corpus_path(),
            model: default_model_path(),
            log: None,
            log_level: default_log_level(),
            event_log: None,
            manifest: default_manifest_path(),
        }
    }
}

impl PathSettings {
    fn resolve_against(&mut self, base: &Path) {
        let join = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        join(&mut self.corpus);
        join(&mut self.model);
        join(&mut self.manifest);
        self.log.iter_mut().for_each(join);
        self.event_log.iter_mut().for_each(join);
    }
}

fn default_hidden_dims() -> Vec<usize> {
    vec![32, 16]
}

const fn default_learning_rate() -> f64 {
    0.001
}

const fn default_seed() -> Option<u64> {
    Some(42)
}

const fn default_epochs() -> usize {
    50
}

const fn default_batch_size() -> usize {
    32
}

const fn default_validation_fraction() -> f64 {
    0.2
}

const fn default_min_session_size() -> usize {
    2
}

const fn default_max_gap_minutes() -> i64 {
    30
}

const fn default_chunk_size() -> usize {
    10
}

const fn default_embedding_len() -> usize {
    8
}

const fn default_true() -> bool {
    true
}

const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/tracks.jsonl")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/mood_model.json")
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("runs/manifest.jsonl")
}
