#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Moodcast engine: turns listening histories into a next-track mood
//! regressor and explains feature batches with predictions and insights.

/// Serving core: request validation, inference and insight assembly.
pub mod analysis;
/// Shuffled minibatch slicing.
pub mod batch;
/// Track features <-> numeric vectors.
pub mod codec;
/// TOML configuration.
pub mod config;
/// Track sources feeding the training pipeline.
pub mod corpus;
/// Supervised examples from sessions.
pub mod dataset;
mod emit;
/// Error types.
pub mod error;
/// Canonical feature list and per-track payload.
pub mod features;
/// Per-epoch loss records.
pub mod history;
/// Rule-based listening insights and recommendations.
pub mod insights;
/// JSONL history of training runs.
pub mod manifest;
/// Mood regressor lifecycle and persistence.
pub mod model;
/// Shared, swappable serving model.
pub mod model_handle;
/// Dense feed-forward network and backpropagation.
pub mod network;
/// SGD and Adam update rules.
pub mod optimizer;
/// Offline training pipeline.
pub mod pipeline;
/// Prediction and insight value types.
pub mod predictions;
/// Session segmentation.
pub mod session;
/// Column statistics over encoded batches.
pub mod stats;
/// Plays and listening sessions.
pub mod track;

pub use analysis::{AnalysisRequest, AnalysisResponse, Analyzer};
pub use config::MoodcastConfig;
pub use corpus::{JsonlTrackSource, TrackSource};
pub use error::{MoodError, MoodResult, PersistenceError};
pub use features::{Feature, TrackFeatures, FEATURE_DIM};
pub use insights::InsightEngine;
pub use manifest::{ManifestEntry, RunManifest};
pub use model::{ModelTopology, MoodModel, TrainOptions};
pub use model_handle::ModelHandle;
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use predictions::{
    ConfidencePolicy, ConfidenceScores, DiversityLevel, ListeningInsights, ModelPredictions,
    MoodPrediction, NextTrackPrediction,
};
pub use session::{build_sessions, SessionBuilder, SessionStrategy};
pub use track::{ListeningSession, Track};
