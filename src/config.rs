use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::model::{ModelId, SAMPLE_RATE};
use crate::pipeline::{FailurePolicy, Split};
use crate::session::{Device, SessionOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Settings for a batch embedding run.
///
/// ```yaml
/// dataset_root: /data/gtzan
/// weights_root: /models/jamendo
/// models: [fcn, sample]
/// device: cuda:0
/// failure_policy: skip-file
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dataset_root: PathBuf,
    pub weights_root: PathBuf,
    /// Defaults to `<dataset_root>/embeddings`.
    pub output_root: Option<PathBuf>,
    pub models: Vec<ModelId>,
    pub splits: Vec<Split>,
    pub device: Device,
    pub failure_policy: FailurePolicy,
    pub sample_rate: u32,
    pub weights_file: String,
    pub intra_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("."),
            weights_root: PathBuf::from("models"),
            output_root: None,
            models: ModelId::ALL.to_vec(),
            splits: Split::ALL.to_vec(),
            device: Device::Cpu,
            failure_policy: FailurePolicy::AbortCategory,
            sample_rate: SAMPLE_RATE,
            weights_file: "best_model.onnx".into(),
            intra_threads: 1,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("no models selected"));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive"));
        }
        if self.intra_threads == 0 {
            return Err(ConfigError::Invalid("intra_threads must be positive"));
        }
        if self.weights_file.is_empty() {
            return Err(ConfigError::Invalid("weights_file is empty"));
        }
        Ok(())
    }

    pub fn output_root(&self) -> PathBuf {
        self.output_root
            .clone()
            .unwrap_or_else(|| self.dataset_root.join("embeddings"))
    }

    /// Directory receiving the stacks and indices of one model.
    pub fn output_dir(&self, id: ModelId) -> PathBuf {
        self.output_root().join(id.as_str())
    }

    pub fn weights_path(&self, id: ModelId) -> PathBuf {
        self.weights_root.join(id.as_str()).join(&self.weights_file)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            device: self.device,
            intra_threads: self.intra_threads,
        }
    }
}
