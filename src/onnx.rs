use std::path::Path;

use ndarray::{Array2, ArrayView2, Ix2};
use ort::session::Session;
use ort::value::DynValue;

use crate::model::{Mode, Model, ModelId, ModelOutput};
use crate::session::{self, SessionOptions};
use crate::EmbedError;

/// Graph input that receives the mel filterbank buffer, when the export has one.
pub const MEL_FB_INPUT: &str = "mel_fb";

/// A tagging network exported to ONNX.
///
/// The graph takes the waveform batch as its first input and returns tag
/// probabilities and representations as its first two outputs.
#[derive(Debug)]
pub struct OnnxModel {
    id: ModelId,
    options: SessionOptions,
    session: Option<Session>,
    mel_filterbank: Option<Array2<f32>>,
    mode: Mode,
}

impl OnnxModel {
    pub fn new(id: ModelId, options: SessionOptions) -> Self {
        Self {
            id,
            options,
            session: None,
            mel_filterbank: None,
            mode: Mode::default(),
        }
    }

    pub fn mel_filterbank(&self) -> Option<&Array2<f32>> {
        self.mel_filterbank.as_ref()
    }
}

impl Model for OnnxModel {
    fn id(&self) -> ModelId {
        self.id
    }

    fn set_mel_filterbank(&mut self, filterbank: Option<Array2<f32>>) -> Result<(), EmbedError> {
        if filterbank.as_ref().is_some_and(|fb| fb.is_empty()) {
            return Err(EmbedError::Inference(format!(
                "{}: empty mel filterbank",
                self.id
            )));
        }
        self.mel_filterbank = filterbank;
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> Result<(), EmbedError> {
        self.session = None;
        self.mode = Mode::Training;

        let session = session::create_session(path, &self.options)
            .map_err(|e| EmbedError::weights(path, e))?;

        if session.inputs.is_empty() {
            return Err(EmbedError::weights(path, "graph has no inputs"));
        }
        if session.outputs.len() < 2 {
            return Err(EmbedError::weights(
                path,
                "graph must output tag probabilities and representation",
            ));
        }
        if self.mel_filterbank.is_some() && !session.inputs.iter().any(|i| i.name == MEL_FB_INPUT) {
            tracing::warn!(model = %self.id, "graph has no '{MEL_FB_INPUT}' input, filterbank override ignored");
        }

        self.session = Some(session);
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
        let session = self.session.as_ref().ok_or(EmbedError::NotLoaded(self.id))?;

        let input_name = session.inputs[0].name.as_str();
        let takes_filterbank = session.inputs.iter().any(|i| i.name == MEL_FB_INPUT);
        let inputs = match &self.mel_filterbank {
            Some(fb) if takes_filterbank => {
                ort::inputs![input_name => batch, MEL_FB_INPUT => fb.view()]?
            }
            _ => ort::inputs![input_name => batch]?,
        };

        let ort_outs = session.run(inputs)?;
        let tags_name = session.outputs[0].name.as_str();
        let repr_name = session.outputs[1].name.as_str();

        Ok(ModelOutput {
            tags: to_array2(ort_outs.get(tags_name), tags_name)?,
            representation: to_array2(ort_outs.get(repr_name), repr_name)?,
        })
    }
}

fn to_array2(value: Option<&DynValue>, name: &str) -> Result<Array2<f32>, EmbedError> {
    let value =
        value.ok_or_else(|| EmbedError::Inference(format!("output tensor '{name}' not found")))?;
    let tensor = value.try_extract_tensor::<f32>()?;
    let tensor = tensor
        .into_dimensionality::<Ix2>()
        .map_err(|e| EmbedError::Inference(format!("output '{name}': {e}")))?;
    Ok(tensor.to_owned())
}
