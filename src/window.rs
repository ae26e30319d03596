//! Fixed-length windowing and averaged inference.

use ndarray::{Array1, Array2, Axis};

use crate::model::Model;
use crate::EmbedError;

/// Window-averaged outputs for one waveform.
#[derive(Debug, Clone)]
pub struct WindowedOutput {
    pub windows: usize,
    pub tags: Array1<f32>,
    pub representation: Array1<f32>,
}

/// Splits `waveform` into `floor(len / input_length)` contiguous,
/// non-overlapping rows. Trailing samples that do not fill a row are dropped.
pub fn frame(waveform: &[f32], input_length: usize) -> Result<Array2<f32>, EmbedError> {
    let windows = if input_length == 0 {
        0
    } else {
        waveform.len() / input_length
    };
    if windows == 0 {
        return Err(EmbedError::InsufficientLength {
            required: input_length,
            got: waveform.len(),
        });
    }

    let used = &waveform[..windows * input_length];
    Array2::from_shape_vec((windows, input_length), used.to_vec())
        .map_err(|e| EmbedError::Inference(e.to_string()))
}

/// Runs `model` once over every window of `waveform` and averages both outputs
/// over the window axis.
pub fn infer_windows<M: Model + ?Sized>(
    model: &mut M,
    waveform: &[f32],
    input_length: usize,
) -> Result<WindowedOutput, EmbedError> {
    let batch = frame(waveform, input_length)?;
    let windows = batch.nrows();
    let out = model.forward(batch.view())?;

    if out.representation.nrows() != windows || out.tags.nrows() != windows {
        return Err(EmbedError::Inference(format!(
            "{}: expected {windows} output rows, got {} representation and {} tag rows",
            model.id(),
            out.representation.nrows(),
            out.tags.nrows()
        )));
    }

    let mean = |a: Array2<f32>| {
        a.mean_axis(Axis(0))
            .ok_or_else(|| EmbedError::Inference("empty output".into()))
    };
    Ok(WindowedOutput {
        windows,
        tags: mean(out.tags)?,
        representation: mean(out.representation)?,
    })
}

/// Embedding of `waveform`: the mean of the per-window representations.
pub fn infer<M: Model + ?Sized>(
    model: &mut M,
    waveform: &[f32],
    input_length: usize,
) -> Result<Array1<f32>, EmbedError> {
    infer_windows(model, waveform, input_length).map(|out| out.representation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, ModelId, ModelOutput};
    use ndarray::ArrayView2;
    use std::path::Path;

    /// Representation row i is `[first sample, sum of window, window length]`.
    #[derive(Default)]
    struct Probe {
        batches: Vec<Array2<f32>>,
    }

    impl Model for Probe {
        fn id(&self) -> ModelId {
            ModelId::Sample
        }

        fn set_mel_filterbank(&mut self, _: Option<Array2<f32>>) -> Result<(), EmbedError> {
            Ok(())
        }

        fn load_state(&mut self, _: &Path) -> Result<(), EmbedError> {
            Ok(())
        }

        fn set_mode(&mut self, _: Mode) {}

        fn mode(&self) -> Mode {
            Mode::Inference
        }

        fn forward(&mut self, batch: ArrayView2<f32>) -> Result<ModelOutput, EmbedError> {
            self.batches.push(batch.to_owned());
            let n = batch.nrows();
            let mut repr = Array2::zeros((n, 3));
            for (i, row) in batch.outer_iter().enumerate() {
                repr[[i, 0]] = row[0];
                repr[[i, 1]] = row.sum();
                repr[[i, 2]] = row.len() as f32;
            }
            Ok(ModelOutput {
                tags: Array2::from_elem((n, 50), 0.5),
                representation: repr,
            })
        }
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn frames_cover_prefix_in_order() {
        let waveform = ramp(23);
        let batch = frame(&waveform, 5).unwrap();
        assert_eq!(batch.dim(), (4, 5));
        for (i, row) in batch.outer_iter().enumerate() {
            let expected: Vec<f32> = (i * 5..i * 5 + 5).map(|s| s as f32).collect();
            assert_eq!(row.to_vec(), expected);
        }
    }

    #[test]
    fn exact_multiple_has_no_remainder() {
        let batch = frame(&ramp(20), 5).unwrap();
        assert_eq!(batch.nrows(), 4);
        assert_eq!(batch[[3, 4]], 19.0);
    }

    #[test]
    fn short_waveform_is_insufficient() {
        let err = frame(&ramp(59048), 59049).unwrap_err();
        assert!(matches!(
            err,
            EmbedError::InsufficientLength {
                required: 59049,
                got: 59048
            }
        ));
        assert!(frame(&[], 10).is_err());
    }

    #[test]
    fn runs_one_batch_and_averages() {
        let mut model = Probe::default();
        let waveform = ramp(320000);
        let out = infer_windows(&mut model, &waveform, 59049).unwrap();

        assert_eq!(model.batches.len(), 1);
        assert_eq!(model.batches[0].dim(), (5, 59049));
        assert_eq!(out.windows, 5);
        assert_eq!(out.representation.len(), 3);
        assert_eq!(out.tags.len(), 50);

        // Window starts are 0, W, 2W, 3W, 4W; their mean is 2W.
        assert_eq!(out.representation[0], 2.0 * 59049.0);
        assert_eq!(out.representation[2], 59049.0);
    }

    #[test]
    fn mean_matches_per_window_values() {
        let mut model = Probe::default();
        let waveform = ramp(10);
        let embedding = infer(&mut model, &waveform, 3).unwrap();
        // Windows [0,1,2] [3,4,5] [6,7,8]; sums 3, 12, 21.
        assert_eq!(embedding.to_vec(), vec![3.0, 12.0, 3.0]);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let mut model = Probe::default();
        let waveform: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.37).sin()).collect();
        let a = infer(&mut model, &waveform, 128).unwrap();
        let b = infer(&mut model, &waveform, 128).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_row_count() {
        struct Short;
        impl Model for Short {
            fn id(&self) -> ModelId {
                ModelId::Hcnn
            }
            fn set_mel_filterbank(&mut self, _: Option<Array2<f32>>) -> Result<(), EmbedError> {
                Ok(())
            }
            fn load_state(&mut self, _: &Path) -> Result<(), EmbedError> {
                Ok(())
            }
            fn set_mode(&mut self, _: Mode) {}
            fn mode(&self) -> Mode {
                Mode::Inference
            }
            fn forward(&mut self, _: ArrayView2<f32>) -> Result<ModelOutput, EmbedError> {
                Ok(ModelOutput {
                    tags: Array2::zeros((1, 50)),
                    representation: Array2::zeros((1, 8)),
                })
            }
        }

        let err = infer(&mut Short, &ramp(40), 10).unwrap_err();
        assert!(matches!(err, EmbedError::Inference(_)));
    }
}
