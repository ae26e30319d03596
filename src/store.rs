use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use ndarray_npy::{read_npy, write_npy};

use crate::EmbedError;

/// Category name to the files embedded for it, in stack row order.
pub type EmbeddingIndex = BTreeMap<String, Vec<String>>;

/// Stacks per-file embeddings into an `(n, dim)` array. An empty category
/// stacks to `(0, 0)`.
pub fn stack(embeddings: &[Array1<f32>]) -> Result<Array2<f32>, String> {
    if embeddings.is_empty() {
        return Ok(Array2::zeros((0, 0)));
    }
    let views: Vec<_> = embeddings.iter().map(|e| e.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| format!("embedding dimensions differ: {e}"))
}

pub fn write_stack(path: &Path, embeddings: &[Array1<f32>]) -> Result<(), EmbedError> {
    let stacked = stack(embeddings).map_err(|e| EmbedError::persist(path, e))?;
    write_npy(path, &stacked).map_err(|e| EmbedError::persist(path, e))
}

pub fn read_stack(path: &Path) -> Result<Array2<f32>, EmbedError> {
    read_npy(path).map_err(|e| EmbedError::persist(path, e))
}

pub fn write_index(path: &Path, index: &EmbeddingIndex) -> Result<(), EmbedError> {
    let file = File::create(path).map_err(|e| EmbedError::persist(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, index).map_err(|e| EmbedError::persist(path, e))?;
    writer.flush().map_err(|e| EmbedError::persist(path, e))
}

pub fn read_index(path: &Path) -> Result<EmbeddingIndex, EmbedError> {
    let file = File::open(path).map_err(|e| EmbedError::filesystem(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| EmbedError::persist(path, e))
}
