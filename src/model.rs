use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::Deserialize;

use crate::EmbedError;

/// Sample rate every model in the registry was trained on.
pub const SAMPLE_RATE: u32 = 16000;

/// Identifies one of the pretrained tagging architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    Fcn,
    Musicnn,
    Crnn,
    Sample,
    Se,
    Attention,
    Hcnn,
}

impl ModelId {
    pub const ALL: [ModelId; 7] = [
        ModelId::Fcn,
        ModelId::Musicnn,
        ModelId::Crnn,
        ModelId::Sample,
        ModelId::Se,
        ModelId::Attention,
        ModelId::Hcnn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Fcn => "fcn",
            ModelId::Musicnn => "musicnn",
            ModelId::Crnn => "crnn",
            ModelId::Sample => "sample",
            ModelId::Se => "se",
            ModelId::Attention => "attention",
            ModelId::Hcnn => "hcnn",
        }
    }

    /// Window length in samples the model consumes per batch row.
    pub fn required_length(self) -> usize {
        let sr = SAMPLE_RATE as usize;
        match self {
            ModelId::Fcn | ModelId::Crnn => 29 * sr,
            ModelId::Musicnn => 3 * sr,
            ModelId::Sample | ModelId::Se => 59049,
            ModelId::Attention => 15 * sr,
            ModelId::Hcnn => 5 * sr,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown model '{0}', expected one of fcn, musicnn, crnn, sample, se, attention, hcnn")]
pub struct UnknownModel(String);

impl FromStr for ModelId {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

/// Whether a model is ready to serve forward passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Training,
    Inference,
}

/// Per-window outputs of one forward pass.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Tag probabilities, shape `(batch, tags)`.
    pub tags: Array2<f32>,
    /// Representation vectors, shape `(batch, dim)`.
    pub representation: Array2<f32>,
}

/// A pretrained tagging network.
///
/// Weight state is applied in two steps: an optional mel filterbank buffer,
/// then the bulk state. See [`crate::load_weights`].
pub trait Model {
    fn id(&self) -> ModelId;

    /// Replaces the frozen mel filterbank buffer. `None` clears a buffer
    /// installed by an earlier state.
    fn set_mel_filterbank(&mut self, filterbank: Option<Array2<f32>>) -> Result<(), EmbedError>;

    /// Loads the bulk trained state from `path`.
    fn load_state(&mut self, path: &Path) -> Result<(), EmbedError>;

    fn set_mode(&mut self, mode: Mode);

    fn mode(&self) -> Mode;

    /// Runs the network over a `(batch, window)` array.
    fn forward(&mut self, batch: ArrayView2<f32>) -> Result<ModelOutput, EmbedError>;
}
