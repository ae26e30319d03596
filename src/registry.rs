use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::{Mode, Model, ModelId};
use crate::onnx::OnnxModel;
use crate::session::SessionOptions;
use crate::weights::load_weights;
use crate::EmbedError;

struct Entry {
    model: Box<dyn Model>,
    weights: Option<PathBuf>,
}

/// Owns one model instance per identifier and remembers which weights each
/// instance currently holds.
#[derive(Default)]
pub struct ModelRegistry {
    entries: BTreeMap<ModelId, Entry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of ONNX-backed models sharing the same session options.
    pub fn onnx(ids: &[ModelId], options: SessionOptions) -> Self {
        let mut registry = Self::new();
        for &id in ids {
            registry.insert(Box::new(OnnxModel::new(id, options)));
        }
        registry
    }

    /// Registers `model` under its own id, replacing any previous instance.
    pub fn insert(&mut self, model: Box<dyn Model>) {
        self.entries.insert(
            model.id(),
            Entry {
                model,
                weights: None,
            },
        );
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.entries.keys().copied()
    }

    pub fn get(&mut self, id: ModelId) -> Result<&mut dyn Model, EmbedError> {
        match self.entries.get_mut(&id) {
            Some(entry) => Ok(entry.model.as_mut()),
            None => Err(EmbedError::Unregistered(id)),
        }
    }

    pub fn required_length(&self, id: ModelId) -> usize {
        id.required_length()
    }

    /// Path of the weights currently loaded into `id`, if any.
    pub fn loaded_weights(&self, id: ModelId) -> Option<&Path> {
        self.entries.get(&id)?.weights.as_deref()
    }

    /// Returns the model for `id` with the weights from `path` loaded,
    /// reading them only if a different state (or none) is loaded.
    pub fn ensure_weights(&mut self, id: ModelId, path: &Path) -> Result<&mut dyn Model, EmbedError> {
        let entry = self.entries.get_mut(&id).ok_or(EmbedError::Unregistered(id))?;

        let current = entry.weights.as_deref() == Some(path) && entry.model.mode() == Mode::Inference;
        if !current {
            entry.weights = None;
            load_weights(entry.model.as_mut(), path)?;
            entry.weights = Some(path.to_path_buf());
        }
        Ok(entry.model.as_mut())
    }
}
