//! Decoding recordings and their segmentation.
//!
//! [`RecordingSource`] is the seam between the extraction engine and whatever
//! produces waveforms plus onsets, offsets and labels. [`BuiltinSource`] reads
//! WAV files with `hound` and evTAF `.cbin` files directly. Segmentation comes
//! from a JSON sidecar next to the audio file, or from amplitude thresholding
//! when there is none.

use crate::config::SegmentParams;
use crate::segment::segment_song;
use crate::types::FileFormat;
use crate::{FeatureError, FeatureResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Label given to segments found by amplitude thresholding.
pub const UNLABELED: char = '-';

/// Output of [`RecordingSource::decode_and_segment`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecording {
    /// Mono waveform on the [-1, 1] scale.
    pub waveform: Vec<f64>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Segment onsets in seconds.
    pub onsets_s: Vec<f64>,
    /// Segment offsets in seconds.
    pub offsets_s: Vec<f64>,
    /// One label character per segment.
    pub labels: Vec<char>,
}

/// Produces a waveform and its segmentation from a file.
pub trait RecordingSource {
    /// Decodes `path` and returns the waveform with its segmentation.
    ///
    /// # Errors
    /// Implementations return [`FeatureError::Decode`] for malformed or
    /// unsupported input.
    fn decode_and_segment(
        &self,
        path: &Path,
        format: FileFormat,
        params: &SegmentParams,
    ) -> FeatureResult<DecodedRecording>;
}

/// The decoder used by [`crate::Recording::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl RecordingSource for BuiltinSource {
    fn decode_and_segment(
        &self,
        path: &Path,
        format: FileFormat,
        params: &SegmentParams,
    ) -> FeatureResult<DecodedRecording> {
        params.validate()?;
        let (waveform, sample_rate) = match format {
            FileFormat::Wav => read_wav(path)?,
            FileFormat::Cbin => read_cbin(path, params)?,
        };

        let (onsets_s, offsets_s, labels) = match read_annotation(path)? {
            Some(annotation) => annotation,
            None => {
                let (onsets, offsets) = segment_song(&waveform, sample_rate, params)?;
                debug!(
                    file = %path.display(),
                    segments = onsets.len(),
                    "no annotation, segmented by amplitude"
                );
                let labels = vec![UNLABELED; onsets.len()];
                (onsets, offsets, labels)
            }
        };

        Ok(DecodedRecording {
            waveform,
            sample_rate,
            onsets_s,
            offsets_s,
            labels,
        })
    }
}

/// Path of the annotation sidecar for an audio file: `<audio file>.json`.
pub fn annotation_path(audio_path: &Path) -> PathBuf {
    let mut name = audio_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

#[derive(Debug, Deserialize)]
struct Annotation {
    onsets_s: Vec<f64>,
    offsets_s: Vec<f64>,
    labels: String,
}

type Segmentation = (Vec<f64>, Vec<f64>, Vec<char>);

fn read_annotation(audio_path: &Path) -> FeatureResult<Option<Segmentation>> {
    let sidecar = annotation_path(audio_path);
    if !sidecar.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&sidecar)?;
    let annotation: Annotation = serde_json::from_str(&text)
        .map_err(|e| FeatureError::decode(&sidecar, format!("invalid annotation: {e}")))?;
    Ok(Some((
        annotation.onsets_s,
        annotation.offsets_s,
        annotation.labels.chars().collect(),
    )))
}

fn read_wav(path: &Path) -> FeatureResult<(Vec<f64>, u32)> {
    let reader = hound::WavReader::open(path).map_err(|e| wav_open_error(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(FeatureError::decode(path, "WAV header declares zero channels"));
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| wav_sample_error(path, e))?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()
            .map_err(|e| wav_sample_error(path, e))?,
    };

    let waveform = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    };
    Ok((waveform, spec.sample_rate))
}

/// Failing to open the file is IO; a header that ends early or is invalid is malformed input.
fn wav_open_error(path: &Path, err: hound::Error) -> FeatureError {
    match err {
        hound::Error::IoError(io) if io.kind() != std::io::ErrorKind::UnexpectedEof => {
            FeatureError::Io(io)
        }
        other => FeatureError::decode(path, other.to_string()),
    }
}

/// Once the header parsed, any read failure means the data chunk is truncated or corrupt.
fn wav_sample_error(path: &Path, err: hound::Error) -> FeatureError {
    FeatureError::decode(path, format!("unreadable sample data: {err}"))
}

fn read_cbin(path: &Path, params: &SegmentParams) -> FeatureResult<(Vec<f64>, u32)> {
    let bytes = fs::read(path)?;
    let frame_bytes = 2 * params.cbin_channels;
    if bytes.len() % frame_bytes != 0 {
        return Err(FeatureError::decode(
            path,
            format!(
                "{} bytes is not a whole number of {}-channel 16-bit frames",
                bytes.len(),
                params.cbin_channels
            ),
        ));
    }

    let waveform = bytes
        .chunks_exact(frame_bytes)
        .map(|frame| i16::from_be_bytes([frame[0], frame[1]]) as f64 / 32768.0)
        .collect();

    let sample_rate = match read_rec_sample_rate(path)? {
        Some(rate) => rate,
        None => params.default_sample_rate,
    };
    Ok((waveform, sample_rate))
}

/// Reads `ADFREQ` from the `.rec` file next to a `.cbin` file, if there is one.
fn read_rec_sample_rate(cbin_path: &Path) -> FeatureResult<Option<u32>> {
    let rec_path = cbin_path.with_extension("rec");
    if !rec_path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&rec_path)?;
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == "ADFREQ" {
            let rate = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|rate| *rate >= 1.0)
                .ok_or_else(|| {
                    FeatureError::decode(&rec_path, format!("invalid ADFREQ '{}'", value.trim()))
                })?;
            return Ok(Some(rate.round() as u32));
        }
    }
    Ok(None)
}
