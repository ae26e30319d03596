mod session;

mod audio;
mod config;
mod embedding;
mod error;
mod model;
mod onnx;
mod pipeline;
mod registry;
mod store;
mod tags;
mod weights;
mod window;

pub use audio::{resample, AudioLoader, FileLoader};
pub use config::{Config, ConfigError};
pub use embedding::EmbeddingExtractor;
pub use error::EmbedError;
pub use model::{Mode, Model, ModelId, ModelOutput, UnknownModel, SAMPLE_RATE};
pub use onnx::{OnnxModel, MEL_FB_INPUT};
pub use pipeline::{
    run, AbortedModel, Action, FailurePolicy, RunSummary, Split, SplitSummary,
};
pub use registry::ModelRegistry;
pub use session::{create_session, Device, SessionOptions, UnknownDevice};
pub use store::{read_index, read_stack, write_index, write_stack, EmbeddingIndex};
pub use tags::{top_tags, TAGS};
pub use weights::{load_weights, WeightState, MEL_FB_KEY};
pub use window::{frame, infer, infer_windows, WindowedOutput};
