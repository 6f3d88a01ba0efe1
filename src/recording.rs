//! Segmented recording model.
//!
//! A [`Recording`] owns one decoded waveform and its syllable segmentation. The
//! caller chooses which syllables take part with [`Recording::set_inclusion_mask`];
//! syllable spectrograms are then computed lazily, once, by
//! [`Recording::ensure_spectrograms`] and cached on the recording.

use crate::config::{SegmentParams, SpectParams};
use crate::decode::{DecodedRecording, RecordingSource};
use crate::spectrogram::{Spectrogram, Spectrogrammer};
use crate::types::{FileFormat, LabelSelection};
use crate::{FeatureError, FeatureResult};
use ndarray::{Array1, ArrayView1};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// One segmented syllable, with its waveform and (if it could be computed) its
/// spectrogram.
#[derive(Debug, Clone)]
pub struct Syllable {
    index: usize,
    onset_s: f64,
    offset_s: f64,
    label: char,
    sample_rate: u32,
    audio: Array1<f64>,
    spect: Option<Spectrogram>,
    params: Arc<SpectParams>,
}

impl Syllable {
    /// Position of the syllable in the recording's full segment list.
    pub const fn segment_index(&self) -> usize {
        self.index
    }

    /// Onset time in seconds.
    pub const fn onset_s(&self) -> f64 {
        self.onset_s
    }

    /// Offset time in seconds.
    pub const fn offset_s(&self) -> f64 {
        self.offset_s
    }

    /// Offset minus onset, in seconds.
    pub fn duration_s(&self) -> f64 {
        self.offset_s - self.onset_s
    }

    /// Label character of the segment.
    pub const fn label(&self) -> char {
        self.label
    }

    /// Sample rate of the waveform.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Raw waveform between onset and offset.
    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.audio.view()
    }

    /// Parameters the spectrogram was computed with, including the analysis
    /// constants used by spectral features.
    pub fn params(&self) -> &SpectParams {
        &self.params
    }

    /// True if a spectrogram could be computed for this syllable.
    pub const fn has_spectrogram(&self) -> bool {
        self.spect.is_some()
    }

    /// The syllable's spectrogram.
    ///
    /// # Errors
    /// Returns [`FeatureError::SpectrogramUnavailable`] when the segment was too
    /// short to window.
    pub fn spectrogram(&self) -> FeatureResult<&Spectrogram> {
        self.spect
            .as_ref()
            .ok_or(FeatureError::SpectrogramUnavailable {
                onset_s: self.onset_s,
            })
    }
}

/// Cached per-syllable spectrogram state of a recording.
#[derive(Debug, Clone)]
enum SyllableCache {
    NotComputed,
    Computed(Vec<Syllable>),
    NotRequired,
}

/// Observable state of the spectrogram cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrogramState {
    /// No spectrogram has been computed yet.
    NotComputed,
    /// Spectrograms exist for every included syllable (some may be unavailable).
    Computed,
    /// Extraction finished without any feature that needed spectrograms.
    NotRequired,
}

/// A decoded recording with its syllable segmentation.
#[derive(Debug, Clone)]
pub struct Recording {
    path: PathBuf,
    waveform: Array1<f64>,
    sample_rate: u32,
    onsets_s: Vec<f64>,
    offsets_s: Vec<f64>,
    labels: Vec<char>,
    syls_to_use: Option<Vec<bool>>,
    syllables: SyllableCache,
}

impl Recording {
    /// Decodes `path` with the built-in decoder.
    ///
    /// # Errors
    /// Returns [`FeatureError::Decode`] or [`FeatureError::Io`] if the audio or its
    /// annotation cannot be read.
    pub fn load(
        path: impl AsRef<Path>,
        format: FileFormat,
        segment_params: &SegmentParams,
    ) -> FeatureResult<Self> {
        Self::load_with(&crate::decode::BuiltinSource, path, format, segment_params)
    }

    /// Decodes `path` with a caller-supplied [`RecordingSource`].
    ///
    /// # Errors
    /// Propagates the source's decode error.
    pub fn load_with<S: RecordingSource + ?Sized>(
        source: &S,
        path: impl AsRef<Path>,
        format: FileFormat,
        segment_params: &SegmentParams,
    ) -> FeatureResult<Self> {
        let path = path.as_ref();
        let decoded = source.decode_and_segment(path, format, segment_params)?;
        debug!(
            file = %path.display(),
            sample_rate = decoded.sample_rate,
            segments = decoded.labels.len(),
            "decoded recording"
        );
        Self::from_decoded(path, decoded)
    }

    /// Builds a recording from already decoded data.
    ///
    /// # Errors
    /// Returns [`FeatureError::Decode`] if onsets, offsets and labels differ in
    /// length, a time is negative or not finite, an onset follows its offset, or
    /// the sample rate is zero.
    pub fn from_decoded(path: impl Into<PathBuf>, decoded: DecodedRecording) -> FeatureResult<Self> {
        let path = path.into();
        let DecodedRecording {
            waveform,
            sample_rate,
            onsets_s,
            offsets_s,
            labels,
        } = decoded;

        if sample_rate == 0 {
            return Err(FeatureError::decode(&path, "sample rate is zero"));
        }
        if onsets_s.len() != offsets_s.len() || onsets_s.len() != labels.len() {
            return Err(FeatureError::decode(
                &path,
                format!(
                    "segmentation lengths differ: {} onsets, {} offsets, {} labels",
                    onsets_s.len(),
                    offsets_s.len(),
                    labels.len()
                ),
            ));
        }
        for (i, (&on, &off)) in onsets_s.iter().zip(&offsets_s).enumerate() {
            if !on.is_finite() || !off.is_finite() || on < 0.0 || off < on {
                return Err(FeatureError::decode(
                    &path,
                    format!("invalid segment {i}: onset {on} s, offset {off} s"),
                ));
            }
        }

        Ok(Self {
            path,
            waveform: Array1::from_vec(waveform),
            sample_rate,
            onsets_s,
            offsets_s,
            labels,
            syls_to_use: None,
            syllables: SyllableCache::NotComputed,
        })
    }

    /// File the recording was decoded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample rate in Hz.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The full decoded waveform.
    pub fn waveform(&self) -> ArrayView1<'_, f64> {
        self.waveform.view()
    }

    /// Onset of every segment in seconds.
    pub fn onsets_s(&self) -> &[f64] {
        &self.onsets_s
    }

    /// Offset of every segment in seconds.
    pub fn offsets_s(&self) -> &[f64] {
        &self.offsets_s
    }

    /// Label of every segment.
    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    /// Number of segments.
    pub fn n_segments(&self) -> usize {
        self.labels.len()
    }

    /// Marks each segment included iff its label is selected.
    ///
    /// Resets any cached spectrograms, since they belong to the previous selection.
    pub fn set_inclusion_mask(&mut self, labels_to_use: &LabelSelection) {
        self.syls_to_use = Some(
            self.labels
                .iter()
                .map(|&label| labels_to_use.contains(label))
                .collect(),
        );
        self.syllables = SyllableCache::NotComputed;
    }

    /// The inclusion mask, if one has been set.
    pub fn inclusion_mask(&self) -> Option<&[bool]> {
        self.syls_to_use.as_deref()
    }

    /// Number of included segments (0 before the mask is set).
    pub fn included_count(&self) -> usize {
        self.syls_to_use
            .as_ref()
            .map_or(0, |mask| mask.iter().filter(|&&used| used).count())
    }

    /// Labels of the included segments, in segment order.
    pub fn included_labels(&self) -> Vec<char> {
        match &self.syls_to_use {
            Some(mask) => self
                .labels
                .iter()
                .zip(mask)
                .filter(|(_, used)| **used)
                .map(|(&label, _)| label)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Computes a spectrogram for every included syllable, once.
    ///
    /// Segments too short for the window get an "unavailable" spectrogram instead
    /// of failing the call. Does nothing if spectrograms were already computed for
    /// the current inclusion mask.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] if the inclusion mask is unset or
    /// the spectrogram parameters are invalid for this sample rate.
    pub fn ensure_spectrograms(&mut self, spect_params: &SpectParams) -> FeatureResult<()> {
        if matches!(self.syllables, SyllableCache::Computed(_)) {
            return Ok(());
        }
        let mask = self.syls_to_use.as_ref().ok_or_else(|| {
            FeatureError::InvalidParameter(
                "Inclusion mask must be set before computing spectrograms".to_string(),
            )
        })?;

        let waveform = self.waveform.as_slice().ok_or_else(|| {
            FeatureError::InvalidParameter("Waveform is not contiguous".to_string())
        })?;
        let spectrogrammer = Spectrogrammer::new(self.sample_rate, spect_params)?;
        let params = Arc::new(spect_params.clone());
        let fs = self.sample_rate as f64;
        let total = waveform.len();
        let width_samples = spect_params
            .syl_spect_width
            .map(|width| (width * fs).round() as usize);

        let mut syllables = Vec::with_capacity(mask.len());
        let mut unavailable = 0usize;

        for (index, used) in mask.iter().enumerate() {
            if !used {
                continue;
            }
            let onset_s = self.onsets_s[index];
            let offset_s = self.offsets_s[index];
            let (start, end) = self.sample_bounds(onset_s, offset_s);
            let audio = Array1::from(waveform[start..end].to_vec());

            let (spect_start, spect_end) = match width_samples {
                Some(width) if end - start <= width => centred_window(start, end, width, total),
                Some(width) => {
                    warn!(
                        file = %self.path.display(),
                        onset_s,
                        duration_s = offset_s - onset_s,
                        width_s = width as f64 / fs,
                        "syllable longer than syl_spect_width, using its own extent"
                    );
                    (start, end)
                }
                None => (start, end),
            };
            let spect = match spectrogrammer.compute(&waveform[spect_start..spect_end]) {
                Ok(spect) => Some(spect),
                Err(err) if err.is_per_syllable() => {
                    trace!(index, onset_s, %err, "spectrogram unavailable");
                    unavailable += 1;
                    None
                }
                Err(err) => return Err(err),
            };

            syllables.push(Syllable {
                index,
                onset_s,
                offset_s,
                label: self.labels[index],
                sample_rate: self.sample_rate,
                audio,
                spect,
                params: Arc::clone(&params),
            });
        }

        debug!(
            file = %self.path.display(),
            syllables = syllables.len(),
            unavailable,
            "computed syllable spectrograms"
        );
        self.syllables = SyllableCache::Computed(syllables);
        Ok(())
    }

    /// Included syllables, if spectrograms have been computed.
    pub fn syllables(&self) -> Option<&[Syllable]> {
        match &self.syllables {
            SyllableCache::Computed(syllables) => Some(syllables),
            SyllableCache::NotComputed | SyllableCache::NotRequired => None,
        }
    }

    /// Records that extraction finished without needing spectrograms.
    pub fn mark_spectrograms_not_required(&mut self) {
        if matches!(self.syllables, SyllableCache::NotComputed) {
            self.syllables = SyllableCache::NotRequired;
        }
    }

    /// Current state of the spectrogram cache.
    pub fn spectrogram_state(&self) -> SpectrogramState {
        match self.syllables {
            SyllableCache::NotComputed => SpectrogramState::NotComputed,
            SyllableCache::Computed(_) => SpectrogramState::Computed,
            SyllableCache::NotRequired => SpectrogramState::NotRequired,
        }
    }

    fn sample_bounds(&self, onset_s: f64, offset_s: f64) -> (usize, usize) {
        let fs = self.sample_rate as f64;
        let total = self.waveform.len();
        let start = ((onset_s * fs).round() as usize).min(total);
        let end = ((offset_s * fs).round() as usize).clamp(start, total);
        (start, end)
    }
}

/// A `width`-sample window centred on `start..end`, shifted to stay inside `0..total`.
fn centred_window(start: usize, end: usize, width: usize, total: usize) -> (usize, usize) {
    if width >= total {
        return (0, total);
    }
    let centre = (start + end) / 2;
    let lo = centre.saturating_sub(width / 2).min(total - width);
    (lo, lo + width)
}
