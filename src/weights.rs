use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ndarray_npy::NpzReader;

use crate::model::{Mode, Model};
use crate::EmbedError;

/// Name of the frozen filterbank entry inside the state sidecar.
pub const MEL_FB_KEY: &str = "spec.mel_scale.fb.npy";

/// Trained state for one model: the network export plus optional buffers
/// stored next to it in a `.npz` sidecar with the same file stem.
#[derive(Debug)]
pub struct WeightState {
    pub graph: PathBuf,
    pub mel_filterbank: Option<Array2<f32>>,
}

impl WeightState {
    pub fn read(path: &Path) -> Result<Self, EmbedError> {
        if !path.is_file() {
            return Err(EmbedError::weights(path, "file not found"));
        }

        let sidecar = path.with_extension("npz");
        let mel_filterbank = if sidecar.is_file() {
            read_filterbank(&sidecar)?
        } else {
            None
        };

        Ok(Self {
            graph: path.to_path_buf(),
            mel_filterbank,
        })
    }
}

fn read_filterbank(sidecar: &Path) -> Result<Option<Array2<f32>>, EmbedError> {
    let file = File::open(sidecar).map_err(|e| EmbedError::weights(sidecar, e))?;
    let mut npz = NpzReader::new(file).map_err(|e| EmbedError::weights(sidecar, e))?;
    let names = npz.names().map_err(|e| EmbedError::weights(sidecar, e))?;
    if !names.iter().any(|n| n == MEL_FB_KEY) {
        return Ok(None);
    }
    let fb: Array2<f32> = npz
        .by_name(MEL_FB_KEY)
        .map_err(|e| EmbedError::weights(sidecar, format!("{MEL_FB_KEY}: {e}")))?;
    Ok(Some(fb))
}

/// Loads trained weights from `path` into `model` and switches it to inference.
///
/// The filterbank of the state, or its absence, is installed before the bulk
/// state load, so nothing from a previously loaded state survives.
pub fn load_weights<M: Model + ?Sized>(model: &mut M, path: &Path) -> Result<(), EmbedError> {
    let state = WeightState::read(path)?;

    if let Some(fb) = &state.mel_filterbank {
        tracing::debug!(model = %model.id(), shape = ?fb.dim(), "installing mel filterbank from state");
    }
    model.set_mel_filterbank(state.mel_filterbank)?;
    model.load_state(&state.graph)?;
    model.set_mode(Mode::Inference);

    tracing::info!(model = %model.id(), path = %path.display(), "weights loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelId, ModelOutput};
    use ndarray::ArrayView2;
    use ndarray_npy::NpzWriter;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        mode: Mode,
        fb: Option<Array2<f32>>,
    }

    impl Model for Recorder {
        fn id(&self) -> ModelId {
            ModelId::Fcn
        }

        fn set_mel_filterbank(&mut self, filterbank: Option<Array2<f32>>) -> Result<(), EmbedError> {
            self.calls.push("filterbank");
            self.fb = filterbank;
            Ok(())
        }

        fn load_state(&mut self, _path: &Path) -> Result<(), EmbedError> {
            self.calls.push("state");
            Ok(())
        }

        fn set_mode(&mut self, mode: Mode) {
            self.calls.push("mode");
            self.mode = mode;
        }

        fn mode(&self) -> Mode {
            self.mode
        }

        fn forward(&mut self, _batch: ArrayView2<f32>) -> Result<ModelOutput, EmbedError> {
            unreachable!()
        }
    }

    #[test]
    fn missing_file_is_weights_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = Recorder::default();
        let err = load_weights(&mut model, &dir.path().join("best_model.onnx")).unwrap_err();
        assert!(matches!(err, EmbedError::WeightsUnavailable { .. }));
        assert!(model.calls.is_empty());
    }

    #[test]
    fn filterbank_precedes_state() {
        let dir = tempfile::tempdir().unwrap();
        let graph = dir.path().join("best_model.onnx");
        std::fs::write(&graph, b"graph").unwrap();

        let mut npz = NpzWriter::new(File::create(dir.path().join("best_model.npz")).unwrap());
        npz.add_array("spec.mel_scale.fb", &Array2::<f32>::from_elem((4, 3), 0.5))
            .unwrap();
        npz.finish().unwrap();

        let mut model = Recorder::default();
        load_weights(&mut model, &graph).unwrap();

        assert_eq!(model.calls, vec!["filterbank", "state", "mode"]);
        assert_eq!(model.mode, Mode::Inference);
        assert_eq!(model.fb.unwrap().dim(), (4, 3));
    }

    #[test]
    fn reload_without_sidecar_clears_filterbank() {
        let dir = tempfile::tempdir().unwrap();
        let with_fb = dir.path().join("a.onnx");
        let without_fb = dir.path().join("b.onnx");
        std::fs::write(&with_fb, b"graph").unwrap();
        std::fs::write(&without_fb, b"graph").unwrap();

        let mut npz = NpzWriter::new(File::create(dir.path().join("a.npz")).unwrap());
        npz.add_array("spec.mel_scale.fb", &Array2::<f32>::ones((4, 3)))
            .unwrap();
        npz.finish().unwrap();

        let mut model = Recorder::default();
        load_weights(&mut model, &with_fb).unwrap();
        assert!(model.fb.is_some());

        load_weights(&mut model, &without_fb).unwrap();
        assert!(model.fb.is_none());
        assert_eq!(
            model.calls,
            vec!["filterbank", "state", "mode", "filterbank", "state", "mode"]
        );
    }

    #[test]
    fn sidecar_without_filterbank() {
        let dir = tempfile::tempdir().unwrap();
        let graph = dir.path().join("best_model.onnx");
        std::fs::write(&graph, b"graph").unwrap();

        let mut npz = NpzWriter::new(File::create(dir.path().join("best_model.npz")).unwrap());
        npz.add_array("other", &Array2::<f32>::zeros((2, 2))).unwrap();
        npz.finish().unwrap();

        let mut model = Recorder::default();
        load_weights(&mut model, &graph).unwrap();
        assert_eq!(model.calls, vec!["filterbank", "state", "mode"]);
        assert!(model.fb.is_none());
    }

    #[test]
    fn malformed_sidecar_is_weights_error() {
        let dir = tempfile::tempdir().unwrap();
        let graph = dir.path().join("best_model.onnx");
        std::fs::write(&graph, b"graph").unwrap();
        std::fs::write(dir.path().join("best_model.npz"), b"not a zip").unwrap();

        let mut model = Recorder::default();
        let err = load_weights(&mut model, &graph).unwrap_err();
        assert!(matches!(err, EmbedError::WeightsUnavailable { .. }));
        assert!(model.calls.is_empty());
    }
}
