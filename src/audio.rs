use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use rubato::{FftFixedInOut, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::EmbedError;

const RESAMPLE_CHUNK: usize = 1024;

/// Decodes an audio file into a mono waveform at a requested sample rate.
pub trait AudioLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, EmbedError>;
}

/// Loads WAV files with `hound` and every other format with `symphonia`,
/// then mixes down to mono and resamples. WAV encodings `hound` rejects
/// (µ-law, A-law, ADPCM) are retried through `symphonia`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl AudioLoader for FileLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, EmbedError> {
        let file = File::open(path).map_err(|e| EmbedError::filesystem(path, e))?;

        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        let (samples, source_rate) = if is_wav {
            match read_wav(file) {
                Ok(decoded) => decoded,
                Err(wav_err) => {
                    tracing::debug!(path = %path.display(), "hound rejected wav, retrying: {wav_err}");
                    let file = File::open(path).map_err(|e| EmbedError::filesystem(path, e))?;
                    decode(file, path)
                        .map_err(|e| EmbedError::decode(path, format!("{wav_err}; {e}")))?
                }
            }
        } else {
            decode(file, path).map_err(|e| EmbedError::decode(path, e))?
        };

        if samples.is_empty() {
            return Err(EmbedError::decode(path, "no audio samples"));
        }
        resample(&samples, source_rate, sample_rate).map_err(|e| EmbedError::decode(path, e))
    }
}

fn mix_to_mono(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() / channels as f32);
    }
}

fn read_wav(file: File) -> Result<(Vec<f32>, u32), hound::Error> {
    let reader = WavReader::new(BufReader::new(file))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut samples = Vec::with_capacity(interleaved.len() / spec.channels.max(1) as usize);
    mix_to_mono(&interleaved, spec.channels as usize, &mut samples);
    Ok((samples, spec.sample_rate))
}

fn decode(file: File, path: &Path) -> Result<(Vec<f32>, u32), SymphoniaError> {
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or(SymphoniaError::Unsupported("no audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or(SymphoniaError::Unsupported("unknown sample rate"))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(path = %path.display(), "skipping corrupt packet: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        mix_to_mono(buf.samples(), spec.channels.count(), &mut samples);
    }

    Ok((samples, source_rate))
}

/// Converts `input` from `from_rate` to `to_rate`, compensating for the
/// resampler delay so the output is aligned with the input.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, String> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1)
            .map_err(|e| e.to_string())?;
    let expected = (input.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut pos = 0;
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let mut chunk = vec![0.0; needed];
        if pos < input.len() {
            let end = (pos + needed).min(input.len());
            chunk[..end - pos].copy_from_slice(&input[pos..end]);
        }
        pos += needed;

        let processed = resampler
            .process(&[chunk], None)
            .map_err(|e| e.to_string())?;
        output.extend_from_slice(&processed[0]);
    }

    Ok(output[delay..delay + expected].to_vec())
}
