use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the engine.
pub type MoodResult<T> = Result<T, MoodError>;

/// Errors raised by the model, the pipeline, and the analysis service.
///
/// The codec and the insight engine never produce errors.
#[derive(Debug, Error)]
pub enum MoodError {
    /// Request payload rejected before touching the model.
    #[error("invalid features for track {track}: {feature} {reason}")]
    Validation {
        /// Position of the offending track in the request batch.
        track: usize,
        /// Feature name (or `batch` for batch-level problems).
        feature: String,
        /// What is wrong with the value.
        reason: String,
    },
    /// Inference requested while no model is loaded.
    #[error("no prediction model is loaded")]
    ModelUnavailable,
    /// Training requested on a model without optimizer/loss.
    #[error("model must be compiled before training")]
    NotCompiled,
    /// Not enough (current, next) pairs to train and validate.
    #[error("training needs at least {required} examples, found {found}")]
    TrainingDataInsufficient {
        /// Examples extracted from the corpus.
        found: usize,
        /// Minimum required.
        required: usize,
    },
    /// Model load/save failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// Track corpus could not be read.
    #[error("track corpus {}: {reason}", path.display())]
    Corpus {
        /// Corpus location.
        path: PathBuf,
        /// Failure description (with line number when relevant).
        reason: String,
    },
    /// Run manifest could not be read or appended.
    #[error("run manifest {}: {reason}", path.display())]
    Manifest {
        /// Manifest location.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// Input tensors disagree in shape.
    #[error("shape mismatch: {0}")]
    Shape(String),
}

/// Failures while persisting or restoring model weights.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure.
    #[error("model file {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not a valid model file.
    #[error("model file {} is malformed: {source}", path.display())]
    Format {
        /// File being decoded.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Persisted input dimension differs from the runtime one.
    #[error("model input dimension {found} does not match expected {expected}")]
    DimensionMismatch {
        /// Runtime input dimension.
        expected: usize,
        /// Dimension recorded in the file.
        found: usize,
    },
    /// Persisted output width differs from the serving target width.
    #[error("model output dimension {found} does not match expected {expected}")]
    OutputMismatch {
        /// Serving output width.
        expected: usize,
        /// Width recorded in the file.
        found: usize,
    },
    /// Layer shapes inside the document are inconsistent.
    #[error("model file layer {layer} is inconsistent: {reason}")]
    Shape {
        /// Layer index.
        layer: usize,
        /// What does not line up.
        reason: String,
    },
    /// Unsupported document version.
    #[error("unsupported model format version {0}")]
    Version(u32),
}

impl MoodError {
    /// Builds a validation error for one feature of one track.
    pub(crate) fn validation(track: usize, feature: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            track,
            feature: feature.to_owned(),
            reason: reason.into(),
        }
    }

    /// True for errors a caller can recover from without operator action.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::ModelUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = MoodError::TrainingDataInsufficient {
            found: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "training needs at least 2 examples, found 1"
        );
        let err: MoodError = PersistenceError::DimensionMismatch {
            expected: 20,
            found: 18,
        }
        .into();
        assert!(err.to_string().contains("18"));
        assert!(!err.is_recoverable());
        assert!(MoodError::ModelUnavailable.is_recoverable());
    }
}
