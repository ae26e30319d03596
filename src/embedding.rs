use std::path::Path;

use ndarray::Array1;

use crate::audio::{AudioLoader, FileLoader};
use crate::config::{Config, ConfigError};
use crate::model::{ModelId, SAMPLE_RATE};
use crate::registry::ModelRegistry;
use crate::window::{self, WindowedOutput};
use crate::EmbedError;

/// Turns audio files into embeddings with the models of a [`ModelRegistry`].
pub struct EmbeddingExtractor<L> {
    registry: ModelRegistry,
    loader: L,
    sample_rate: u32,
}

impl EmbeddingExtractor<FileLoader> {
    /// ONNX-backed extractor for `models`, built from a validated `config`.
    pub fn from_config(config: &Config, models: &[ModelId]) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = ModelRegistry::onnx(models, config.session_options());
        Ok(Self::new(registry, FileLoader).with_sample_rate(config.sample_rate))
    }
}

impl<L: AudioLoader> EmbeddingExtractor<L> {
    pub fn new(registry: ModelRegistry, loader: L) -> Self {
        Self {
            registry,
            loader,
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    /// Loads `weights` into the model for `id` unless they are already loaded.
    pub fn prepare(&mut self, id: ModelId, weights: &Path) -> Result<(), EmbedError> {
        self.registry.ensure_weights(id, weights).map(|_| ())
    }

    /// Embedding of one file: the mean representation over its windows.
    ///
    /// Weights are read on the first call for a given `(id, weights)` pair and
    /// reused afterwards, instead of being reloaded for every file.
    pub fn compute(
        &mut self,
        path: &Path,
        id: ModelId,
        weights: &Path,
    ) -> Result<Array1<f32>, EmbedError> {
        self.compute_windows(path, id, weights)
            .map(|out| out.representation)
    }

    /// Both window-averaged outputs for one file.
    pub fn compute_windows(
        &mut self,
        path: &Path,
        id: ModelId,
        weights: &Path,
    ) -> Result<WindowedOutput, EmbedError> {
        let model = self.registry.ensure_weights(id, weights)?;
        let samples = self.loader.load(path, self.sample_rate)?;
        let out = window::infer_windows(model, &samples, id.required_length())?;

        tracing::debug!(
            file = %path.display(),
            model = %id,
            windows = out.windows,
            dim = out.representation.len(),
            "embedded"
        );
        Ok(out)
    }
}
