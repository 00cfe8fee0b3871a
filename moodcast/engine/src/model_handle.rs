use std::{path::Path, sync::Arc};

use parking_lot::RwLock;

use crate::{
    codec::TARGET_DIM,
    error::{MoodError, MoodResult, PersistenceError},
    features::FEATURE_DIM,
    model::MoodModel,
};

/// Shared, swappable reference to the serving model.
///
/// Clones share the same slot. Readers take a snapshot and keep using it even
/// if another thread installs a replacement meanwhile.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    slot: Arc<RwLock<Option<Arc<MoodModel>>>>,
}

impl ModelHandle {
    /// Empty handle; inference fails until a model is installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle pre-loaded with `model`.
    #[must_use]
    pub fn with_model(model: MoodModel) -> Self {
        let handle = Self::new();
        handle.install(model);
        handle
    }

    /// Current model, or `ModelUnavailable`.
    pub fn snapshot(&self) -> MoodResult<Arc<MoodModel>> {
        self.slot.read().clone().ok_or(MoodError::ModelUnavailable)
    }

    /// Replaces the serving model.
    pub fn install(&self, model: MoodModel) {
        *self.slot.write() = Some(Arc::new(model));
    }

    /// Loads weights from disk and installs them.
    ///
    /// The file must map the canonical feature vector onto the three mood
    /// targets. On failure the previously installed model keeps serving.
    pub fn load_from(&self, path: impl AsRef<Path>) -> MoodResult<()> {
        let model = MoodModel::load(path, FEATURE_DIM)?;
        let found = model.topology().output_dim;
        if found != TARGET_DIM {
            return Err(PersistenceError::OutputMismatch {
                expected: TARGET_DIM,
                found,
            }
            .into());
        }
        self.install(model);
        Ok(())
    }

    /// True when a model is installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }
}
