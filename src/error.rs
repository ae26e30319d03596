use std::path::PathBuf;

use thiserror::Error;

use crate::model::ModelId;

/// Errors returned by embedding operations.
///
/// Each variant is a distinct failure kind so the batch pipeline can decide
/// per kind whether to skip a file, abort a category or abort a model.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("insufficient audio length: need at least {required} samples, got {got}")]
    InsufficientLength { required: usize, got: usize },

    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("weights unavailable at {}: {reason}", path.display())]
    WeightsUnavailable { path: PathBuf, reason: String },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model {0} has no weights loaded")]
    NotLoaded(ModelId),

    #[error("model {0} is not registered")]
    Unregistered(ModelId),

    #[error("failed to persist {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}

impl EmbedError {
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn weights(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WeightsUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ort::Error> for EmbedError {
    fn from(e: ort::Error) -> Self {
        Self::Inference(e.to_string())
    }
}
