#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hound::{WavSpec, WavWriter};
use music_embed::{
    AudioLoader, Config, EmbedError, EmbeddingExtractor, FileLoader, Mode, Model, ModelId,
    ModelOutput, ModelRegistry,
};
use ndarray::{Array2, ArrayView2};

pub const SAMPLE_RATE: u32 = 16000;

/// Representation row per window: `[mean, first sample, window length]`.
pub struct StatsModel {
    id: ModelId,
    mode: Mode,
    pub loads: Rc<Cell<usize>>,
}

impl StatsModel {
    pub fn new(id: ModelId) -> Self {
        Self {
            id,
            mode: Mode::Training,
            loads: Rc::new(Cell::new(0)),
        }
    }
}

impl Model for StatsModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn set_mel_filterbank(&mut self, _: Option<Array2<f32>>) -> Result<(), EmbedError> {
        Ok(())
    }

    fn load_state(&mut self, _: &Path) -> Result<(), EmbedError> {
        self.loads.set(self.loads.get() + 1);
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn forward(&mut self, batch: ArrayView2<f32>) -> Result<ModelOutput, EmbedError> {
        if self.mode != Mode::Inference {
            return Err(EmbedError::NotLoaded(self.id));
        }
        let n = batch.nrows();
        let mut repr = Array2::zeros((n, 3));
        let mut tags = Array2::zeros((n, 50));
        for (i, row) in batch.outer_iter().enumerate() {
            let mean = row.mean().unwrap_or(0.0);
            repr[[i, 0]] = mean;
            repr[[i, 1]] = row[0];
            repr[[i, 2]] = row.len() as f32;
            tags[[i, 42]] = mean;
        }
        Ok(ModelOutput {
            tags,
            representation: repr,
        })
    }
}

/// File loader that records every path it is asked to decode.
#[derive(Default)]
pub struct RecordingLoader {
    pub seen: Rc<RefCell<Vec<PathBuf>>>,
}

impl AudioLoader for RecordingLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, EmbedError> {
        self.seen.borrow_mut().push(path.to_path_buf());
        FileLoader.load(path, sample_rate)
    }
}

/// Writes a mono 16 kHz WAV holding a constant `level`.
pub fn write_tone(path: &Path, seconds: u32, level: f32) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let sample = (level * 32768.0) as i16;
    for _ in 0..seconds * SAMPLE_RATE {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn write_corrupt(path: &Path) {
    std::fs::write(path, b"RIFF\0\0\0\0garbage").unwrap();
}

/// Creates `<weights_root>/<id>/best_model.onnx` placeholders.
pub fn write_weights(weights_root: &Path, ids: &[ModelId]) {
    for id in ids {
        let dir = weights_root.join(id.as_str());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("best_model.onnx"), b"weights").unwrap();
    }
}

pub fn category(root: &Path, split_dir: &str, name: &str) -> PathBuf {
    let dir = root.join(split_dir).join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn config(root: &Path, ids: &[ModelId]) -> Config {
    Config {
        dataset_root: root.join("dataset"),
        weights_root: root.join("weights"),
        models: ids.to_vec(),
        ..Config::default()
    }
}

pub struct Harness {
    pub extractor: EmbeddingExtractor<RecordingLoader>,
    pub seen: Rc<RefCell<Vec<PathBuf>>>,
    pub loads: Rc<Cell<usize>>,
}

pub fn harness(id: ModelId) -> Harness {
    let model = StatsModel::new(id);
    let loads = model.loads.clone();
    let mut registry = ModelRegistry::new();
    registry.insert(Box::new(model));

    let loader = RecordingLoader::default();
    let seen = loader.seen.clone();
    Harness {
        extractor: EmbeddingExtractor::new(registry, loader),
        seen,
        loads,
    }
}
