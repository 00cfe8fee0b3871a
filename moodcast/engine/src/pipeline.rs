//! Offline training: track source -> sessions -> examples -> trained,
//! persisted model.

use std::{path::PathBuf, time::Instant};

use moodcast_telemetry::{LogLevel, Telemetry};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::MoodcastConfig,
    corpus::TrackSource,
    dataset::{extract_examples, ExampleSet, MIN_EXAMPLES},
    emit,
    error::{MoodError, MoodResult},
    manifest::{ManifestEntry, RunManifest},
    model::MoodModel,
    model_handle::ModelHandle,
    session::SessionBuilder,
};

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Where the tracks came from.
    pub source: String,
    /// Tracks loaded.
    pub tracks: usize,
    /// Sessions kept after the size filter.
    pub sessions: usize,
    /// Usable (current, next) pairs.
    pub examples: usize,
    /// Pairs skipped because a side had no features.
    pub dropped_pairs: usize,
    /// Examples used for fitting.
    pub train_examples: usize,
    /// Examples held out.
    pub validation_examples: usize,
    /// Epochs actually run.
    pub epochs_run: usize,
    /// True when early stopping cut the run short.
    pub stopped_early: bool,
    /// Training loss of the last epoch.
    pub final_train_loss: f64,
    /// Validation loss of the last epoch.
    pub final_val_loss: Option<f64>,
    /// Lowest validation loss seen.
    pub best_val_loss: Option<f64>,
    /// Epoch of `best_val_loss`.
    pub best_epoch: Option<usize>,
    /// Where the model was written.
    pub model_path: PathBuf,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

/// Runs the training steps in order and persists the result.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: MoodcastConfig,
    telemetry: Telemetry,
    manifest: Option<RunManifest>,
}

impl TrainingPipeline {
    /// Pipeline for `config` with silent telemetry and no manifest.
    #[must_use]
    pub fn new(config: MoodcastConfig) -> Self {
        Self {
            config,
            telemetry: Telemetry::disabled("pipeline"),
            manifest: None,
        }
    }

    /// Replaces the telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Appends every successful run to `manifest`.
    #[must_use]
    pub fn with_manifest(mut self, manifest: RunManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MoodcastConfig {
        &self.config
    }

    /// Trains, saves and reports.
    pub fn run(&self, source: &dyn TrackSource) -> MoodResult<TrainingReport> {
        self.train(source).map(|(report, _)| report)
    }

    /// Trains, saves, then swaps the new model into `handle`.
    pub fn run_and_install(
        &self,
        source: &dyn TrackSource,
        handle: &ModelHandle,
    ) -> MoodResult<TrainingReport> {
        let (report, model) = self.train(source)?;
        handle.install(model);
        emit::event(
            &self.telemetry,
            "model.loaded",
            json!({ "path": report.model_path }),
        );
        Ok(report)
    }

    fn train(&self, source: &dyn TrackSource) -> MoodResult<(TrainingReport, MoodModel)> {
        let started = Instant::now();
        emit::event(
            &self.telemetry,
            "training.started",
            json!({ "source": source.describe() }),
        );
        let outcome = self.execute(source, started);
        match &outcome {
            Ok((report, _)) => {
                if let Some(manifest) = &self.manifest {
                    // model is already saved; manifest failures only warn
                    if let Err(err) = manifest.append(&ManifestEntry::new(report.clone())) {
                        emit::log(
                            &self.telemetry,
                            LogLevel::Warn,
                            "manifest_append_failed",
                            json!({
                                "manifest": manifest.path(),
                                "error": err.to_string(),
                            }),
                        );
                    }
                }
                emit::log(
                    &self.telemetry,
                    LogLevel::Info,
                    "training_completed",
                    json!({
                        "examples": report.examples,
                        "epochs": report.epochs_run,
                        "final_val_loss": report.final_val_loss,
                        "model": report.model_path,
                    }),
                );
                emit::event(
                    &self.telemetry,
                    "training.completed",
                    serde_json::to_value(report).unwrap_or_default(),
                );
            }
            Err(err) => emit::log(
                &self.telemetry,
                LogLevel::Error,
                "training_failed",
                json!({ "error": err.to_string() }),
            ),
        }
        outcome
    }

    fn execute(
        &self,
        source: &dyn TrackSource,
        started: Instant,
    ) -> MoodResult<(TrainingReport, MoodModel)> {
        let config = &self.config;

        let mut tracks = source.load_tracks()?;
        tracks.sort_by_key(|track| track.played_at);

        let sessions = SessionBuilder::new(config.session.strategy())
            .build(&tracks, config.training.min_session_size);
        let extraction = extract_examples(&sessions);
        if extraction.dropped_pairs > 0 {
            emit::log(
                &self.telemetry,
                LogLevel::Warn,
                "pairs_without_features",
                json!({ "dropped": extraction.dropped_pairs }),
            );
        }
        if extraction.examples.len() < MIN_EXAMPLES {
            return Err(MoodError::TrainingDataInsufficient {
                found: extraction.examples.len(),
                required: MIN_EXAMPLES,
            });
        }

        let examples = ExampleSet::stack(&extraction.examples);
        let (train, validation) = examples.split(config.training.validation_fraction)?;
        emit::log(
            &self.telemetry,
            LogLevel::Info,
            "training_started",
            json!({
                "tracks": tracks.len(),
                "sessions": sessions.len(),
                "train": train.len(),
                "validation": validation.len(),
            }),
        );

        let mut model = MoodModel::build(config.topology(), config.model.seed)?;
        model.compile(config.model.optimizer, config.model.learning_rate)?;
        let history =
            model.train_with_progress(&train, &validation, &config.train_options(), |record| {
                emit::log(
                    &self.telemetry,
                    LogLevel::Debug,
                    "training_epoch",
                    json!({
                        "epoch": record.epoch,
                        "train_loss": record.train_loss,
                        "val_loss": record.val_loss,
                    }),
                );
            })?;
        if history.stopped_early {
            emit::log(
                &self.telemetry,
                LogLevel::Info,
                "early_stop",
                json!({ "summary": history.summary() }),
            );
        }

        model.save(&config.paths.model)?;

        let last = history.last();
        let best = history.best();
        let report = TrainingReport {
            source: source.describe(),
            tracks: tracks.len(),
            sessions: sessions.len(),
            examples: examples.len(),
            dropped_pairs: extraction.dropped_pairs,
            train_examples: train.len(),
            validation_examples: validation.len(),
            epochs_run: history.len(),
            stopped_early: history.stopped_early,
            final_train_loss: last.map_or(f64::NAN, |record| record.train_loss),
            final_val_loss: last.and_then(|record| record.val_loss),
            best_val_loss: best.and_then(|record| record.val_loss),
            best_epoch: best.map(|record| record.epoch),
            model_path: config.paths.model.clone(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        Ok((report, model))
    }
}
