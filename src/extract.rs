//! Feature assembly engine.
//!
//! [`FeatureExtractor`] turns a segmented [`Recording`] and a list of feature
//! names into one matrix with a row per included syllable. Every requested
//! feature contributes one or more adjacent columns, and
//! [`ExtractionOutput::feature_index`] maps each column back to the position of
//! the feature in the request.
//!
//! Syllables whose spectrogram could not be computed keep NaN in the columns of
//! single-syllable features; [`ExtractionOutput::complete_rows`] reports which
//! rows are free of them.

use crate::config::{ExtractConfig, SegmentParams, SpectParams};
use crate::features::{
    FeatureKind, FeatureRegistry, FeatureValue, GroupFn, SingleSyllableFeature, default_registry,
};
use crate::recording::Recording;
use crate::types::{FileFormat, LabelSelection, UnknownFeaturePolicy};
use crate::{FeatureError, FeatureResult};
use ndarray::{Array1, Array2, ArrayView2, Axis, concatenate};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Feature matrix of one recording with its row labels and column index.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutput {
    features: Array2<f64>,
    labels: Vec<char>,
    feature_index: Vec<usize>,
}

impl ExtractionOutput {
    /// Assembles an output, checking that rows and columns line up.
    ///
    /// # Errors
    /// Returns [`FeatureError::DimensionMismatch`] if `labels` or `feature_index`
    /// disagree with the matrix shape.
    pub fn new(
        features: Array2<f64>,
        labels: Vec<char>,
        feature_index: Vec<usize>,
    ) -> FeatureResult<Self> {
        if features.nrows() != labels.len() || features.ncols() != feature_index.len() {
            return Err(FeatureError::DimensionMismatch(format!(
                "matrix is {:?} but there are {} labels and {} index entries",
                features.dim(),
                labels.len(),
                feature_index.len()
            )));
        }
        Ok(Self {
            features,
            labels,
            feature_index,
        })
    }

    /// The `(n_syllables, n_columns)` feature matrix.
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Label of each row.
    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    /// Request position of each column.
    pub fn feature_index(&self) -> &[usize] {
        &self.feature_index
    }

    /// Number of rows, one per included syllable.
    pub fn n_syllables(&self) -> usize {
        self.features.nrows()
    }

    /// Number of columns over all features.
    pub fn n_columns(&self) -> usize {
        self.features.ncols()
    }

    /// Columns contributed by the feature at `position` in the request, in order.
    ///
    /// Empty if the feature contributed nothing (e.g. an unknown name).
    pub fn feature_block(&self, position: usize) -> Array2<f64> {
        let columns: Vec<usize> = self
            .feature_index
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p == position)
            .map(|(col, _)| col)
            .collect();
        self.features.select(Axis(1), &columns)
    }

    /// `(position, block)` for every feature that contributed columns, in request order.
    pub fn feature_blocks(&self) -> Vec<(usize, Array2<f64>)> {
        let mut positions = self.feature_index.clone();
        positions.dedup();
        positions
            .into_iter()
            .map(|position| (position, self.feature_block(position)))
            .collect()
    }

    /// True for each row with no NaN sentinel.
    pub fn complete_rows(&self) -> Vec<bool> {
        self.features
            .axis_iter(Axis(0))
            .map(|row| row.iter().all(|v| !v.is_nan()))
            .collect()
    }

    /// Splits into `(features, labels, feature_index)`.
    pub fn into_parts(self) -> (Array2<f64>, Vec<char>, Vec<usize>) {
        (self.features, self.labels, self.feature_index)
    }
}

/// Columns accumulated for one single-syllable feature.
enum FeatureColumns {
    Scalar(Array1<f64>),
    Vector(Array2<f64>),
}

impl FeatureColumns {
    /// Allocates NaN-filled storage sized by the first value and writes it at `row`.
    fn first(n_rows: usize, row: usize, value: FeatureValue) -> Self {
        match value {
            FeatureValue::Scalar(v) => {
                let mut column = Array1::from_elem(n_rows, f64::NAN);
                column[row] = v;
                Self::Scalar(column)
            }
            FeatureValue::Vector(values) => {
                let mut block = Array2::from_elem((n_rows, values.len()), f64::NAN);
                block.row_mut(row).assign(&values);
                Self::Vector(block)
            }
        }
    }

    /// NaN-filled storage of a declared vector width.
    fn declared(n_rows: usize, width: usize) -> Self {
        Self::Vector(Array2::from_elem((n_rows, width), f64::NAN))
    }

    fn write(&mut self, row: usize, value: FeatureValue, name: &str) -> FeatureResult<()> {
        match (self, value) {
            (Self::Scalar(column), FeatureValue::Scalar(v)) => {
                column[row] = v;
                Ok(())
            }
            (Self::Vector(block), FeatureValue::Vector(values)) if values.len() == block.ncols() => {
                block.row_mut(row).assign(&values);
                Ok(())
            }
            (Self::Vector(block), FeatureValue::Vector(values)) => {
                Err(FeatureError::DimensionMismatch(format!(
                    "feature '{name}' returned {} values for row {row}, expected {}",
                    values.len(),
                    block.ncols()
                )))
            }
            (Self::Scalar(_), FeatureValue::Vector(_)) | (Self::Vector(_), FeatureValue::Scalar(_)) => {
                Err(FeatureError::DimensionMismatch(format!(
                    "feature '{name}' mixed scalar and vector results"
                )))
            }
        }
    }

    fn into_block(self) -> Array2<f64> {
        match self {
            Self::Scalar(column) => column.insert_axis(Axis(1)),
            Self::Vector(block) => block,
        }
    }
}

/// Extracts feature matrices from recordings using a feature registry.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    registry: Arc<FeatureRegistry>,
    unknown_features: UnknownFeaturePolicy,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    /// An extractor over the built-in catalogue that warns on unknown names.
    pub fn new() -> Self {
        Self {
            registry: default_registry(),
            unknown_features: UnknownFeaturePolicy::default(),
        }
    }

    /// An extractor over a caller-supplied catalogue.
    pub fn with_registry(registry: impl Into<Arc<FeatureRegistry>>) -> Self {
        Self {
            registry: registry.into(),
            unknown_features: UnknownFeaturePolicy::default(),
        }
    }

    /// Sets the handling of names found in neither catalogue.
    pub fn unknown_features(mut self, policy: UnknownFeaturePolicy) -> Self {
        self.unknown_features = policy;
        self
    }

    /// The catalogue names are resolved against.
    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Loads `path` and extracts `feature_names` from the syllables whose label
    /// is in `labels_to_use`.
    ///
    /// Returns `Ok(None)` after one warning if no syllable matches.
    ///
    /// # Errors
    /// Decode errors, parameter errors, [`FeatureError::UnknownFeature`] under
    /// [`UnknownFeaturePolicy::Error`], dimension mismatches and any error a
    /// feature function raises.
    pub fn extract<S: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        format: FileFormat,
        feature_names: &[S],
        spect_params: &SpectParams,
        labels_to_use: &LabelSelection,
        segment_params: &SegmentParams,
    ) -> FeatureResult<Option<ExtractionOutput>> {
        let mut recording = Recording::load(path, format, segment_params)?;
        self.extract_recording(&mut recording, feature_names, spect_params, labels_to_use)
    }

    /// [`Self::extract`] driven by an [`ExtractConfig`], with `"svm"` / `"knn"`
    /// expanded. `feature_index` refers to positions in the expanded list.
    ///
    /// The config's [`UnknownFeaturePolicy`] replaces this extractor's for the call.
    ///
    /// # Errors
    /// See [`Self::extract`].
    pub fn extract_with_config(
        &self,
        path: impl AsRef<Path>,
        format: FileFormat,
        config: &ExtractConfig,
    ) -> FeatureResult<Option<ExtractionOutput>> {
        config.validate()?;
        let feature_names = config.expanded_features();
        let extractor = Self {
            registry: Arc::clone(&self.registry),
            unknown_features: config.unknown_features,
        };
        extractor.extract(
            path,
            format,
            feature_names.as_slice(),
            &config.spect_params,
            &config.labels_to_use,
            &config.segment_params,
        )
    }

    /// Extracts features from an already loaded recording.
    ///
    /// Sets the recording's inclusion mask from `labels_to_use`, which discards
    /// any spectrograms cached for a previous selection.
    ///
    /// # Errors
    /// See [`Self::extract`].
    pub fn extract_recording<S: AsRef<str>>(
        &self,
        recording: &mut Recording,
        feature_names: &[S],
        spect_params: &SpectParams,
        labels_to_use: &LabelSelection,
    ) -> FeatureResult<Option<ExtractionOutput>> {
        recording.set_inclusion_mask(labels_to_use);
        let n_rows = recording.included_count();
        if n_rows == 0 {
            warn!(
                file = %recording.path().display(),
                labels = %labels_to_use,
                "no syllables match the requested labels, skipping file"
            );
            return Ok(None);
        }

        let mut blocks: Vec<Array2<f64>> = Vec::with_capacity(feature_names.len());
        let mut feature_index = Vec::new();
        let mut used_spectrograms = false;

        for (position, name) in feature_names.iter().enumerate() {
            let name = name.as_ref();
            let block = match self.registry.resolve(name) {
                Some(FeatureKind::SingleSyllable(f)) => {
                    used_spectrograms = true;
                    single_syllable_block(recording, name, f, spect_params, n_rows)?
                }
                Some(FeatureKind::Group(f)) => group_block(recording, name, f, n_rows)?,
                None => {
                    self.handle_unknown(name, recording.path())?;
                    continue;
                }
            };
            debug!(feature = name, position, columns = block.ncols(), "feature extracted");
            feature_index.extend(std::iter::repeat_n(position, block.ncols()));
            blocks.push(block);
        }

        if !used_spectrograms {
            recording.mark_spectrograms_not_required();
        }

        let features = if blocks.is_empty() {
            Array2::zeros((n_rows, 0))
        } else {
            let views: Vec<_> = blocks.iter().map(Array2::view).collect();
            concatenate(Axis(1), &views)
                .map_err(|e| FeatureError::DimensionMismatch(e.to_string()))?
        };

        debug!(
            file = %recording.path().display(),
            syllables = n_rows,
            columns = features.ncols(),
            "extraction finished"
        );
        ExtractionOutput::new(features, recording.included_labels(), feature_index).map(Some)
    }

    fn handle_unknown(&self, name: &str, path: &Path) -> FeatureResult<()> {
        match self.unknown_features {
            UnknownFeaturePolicy::Skip => Ok(()),
            UnknownFeaturePolicy::Warn => {
                warn!(feature = name, file = %path.display(), "unknown feature name, skipping");
                Ok(())
            }
            UnknownFeaturePolicy::Error => Err(FeatureError::UnknownFeature(name.to_string())),
        }
    }
}

fn single_syllable_block(
    recording: &mut Recording,
    name: &str,
    feature: SingleSyllableFeature,
    spect_params: &SpectParams,
    n_rows: usize,
) -> FeatureResult<Array2<f64>> {
    recording.ensure_spectrograms(spect_params)?;
    let mut columns = match feature.arity {
        Some(arity) => Some(FeatureColumns::declared(
            n_rows,
            arity(spect_params, recording.sample_rate())?,
        )),
        None => None,
    };
    let syllables = recording.syllables().ok_or_else(|| {
        FeatureError::InvalidParameter("Syllable spectrograms were not computed".to_string())
    })?;

    for (row, syllable) in syllables.iter().enumerate() {
        if !syllable.has_spectrogram() {
            trace!(feature = name, row, onset_s = syllable.onset_s(), "spectrogram unavailable, leaving NaN");
            continue;
        }
        let value = (feature.compute)(syllable)?;
        match columns.as_mut() {
            Some(columns) => columns.write(row, value, name)?,
            None => columns = Some(FeatureColumns::first(n_rows, row, value)),
        }
    }

    Ok(match columns {
        Some(columns) => columns.into_block(),
        // undeclared width and no syllable produced a value
        None => Array2::from_elem((n_rows, 1), f64::NAN),
    })
}

fn group_block(
    recording: &Recording,
    name: &str,
    f: GroupFn,
    n_rows: usize,
) -> FeatureResult<Array2<f64>> {
    let mask = recording.inclusion_mask().ok_or_else(|| {
        FeatureError::InvalidParameter("Inclusion mask must be set".to_string())
    })?;
    let values = f(recording.onsets_s(), recording.offsets_s(), mask)?;
    if values.len() != n_rows {
        return Err(FeatureError::DimensionMismatch(format!(
            "group feature '{name}' returned {} values for {n_rows} included syllables",
            values.len()
        )));
    }
    Ok(values.insert_axis(Axis(1)))
}

/// Extracts features from one file with the built-in catalogue.
///
/// Returns `Ok(None)` after one warning when no syllable carries a requested
/// label. Unknown feature names are skipped with a warning.
///
/// # Errors
/// See [`FeatureExtractor::extract`].
pub fn extract<S: AsRef<str>>(
    path: impl AsRef<Path>,
    format: FileFormat,
    feature_names: &[S],
    spect_params: &SpectParams,
    labels_to_use: &LabelSelection,
    segment_params: &SegmentParams,
) -> FeatureResult<Option<ExtractionOutput>> {
    FeatureExtractor::new().extract(
        path,
        format,
        feature_names,
        spect_params,
        labels_to_use,
        segment_params,
    )
}
