//! Feature extraction over many recordings.
//!
//! [`BatchExtractor`] runs the single-file extraction for every file of a
//! batch, sequentially or (with the `parallel-processing` feature) on a rayon
//! pool, and stacks the per-file matrices into one [`FeatureTable`]. Files with
//! no matching syllables are recorded as skipped. Files whose column layout
//! differs from the rest are rejected.

#[cfg(feature = "parallel-processing")]
mod parallel;
pub mod progress;

pub use progress::{CallbackProgressReporter, NullProgressReporter, ProgressInfo, ProgressReporter};

#[cfg(feature = "progress-tracking")]
pub use progress::ProgressBarReporter;

use crate::config::ExtractConfig;
use crate::extract::{ExtractionOutput, FeatureExtractor};
use crate::types::FileFormat;
use crate::{FeatureError, FeatureResult};
use ndarray::{Array2, ArrayView2, Axis, concatenate};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::debug;

/// Rows contributed by one file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRows {
    /// The recording.
    pub path: PathBuf,
    /// Rows of the table holding its syllables. Empty for skipped files.
    pub rows: Range<usize>,
}

/// Per-file feature matrices stacked row-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    features: Array2<f64>,
    labels: Vec<char>,
    feature_index: Vec<usize>,
    feature_names: Vec<String>,
    files: Vec<FileRows>,
}

impl FeatureTable {
    /// Stacks per-file results in the given order.
    ///
    /// `None` results (no matching syllables) contribute no rows.
    ///
    /// # Errors
    /// Returns [`FeatureError::InconsistentColumns`] naming the first file whose
    /// `feature_index` differs from the first non-empty file's.
    pub fn from_outputs(
        feature_names: Vec<String>,
        outputs: impl IntoIterator<Item = (PathBuf, Option<ExtractionOutput>)>,
    ) -> FeatureResult<Self> {
        let mut feature_index: Option<Vec<usize>> = None;
        let mut blocks = Vec::new();
        let mut labels = Vec::new();
        let mut files = Vec::new();

        for (path, output) in outputs {
            let start = labels.len();
            let Some(output) = output else {
                files.push(FileRows {
                    path,
                    rows: start..start,
                });
                continue;
            };

            let (features, file_labels, file_index) = output.into_parts();
            match &feature_index {
                Some(expected) if *expected != file_index => {
                    return Err(FeatureError::InconsistentColumns {
                        path,
                        reason: format!(
                            "{} columns with index {:?}, expected {} columns with index {:?}",
                            file_index.len(),
                            file_index,
                            expected.len(),
                            expected
                        ),
                    });
                }
                Some(_) => {}
                None => feature_index = Some(file_index),
            }

            labels.extend(file_labels);
            blocks.push(features);
            files.push(FileRows {
                path,
                rows: start..labels.len(),
            });
        }

        let feature_index = feature_index.unwrap_or_default();
        let features = if blocks.is_empty() {
            Array2::zeros((0, feature_index.len()))
        } else {
            let views: Vec<ArrayView2<'_, f64>> = blocks.iter().map(Array2::view).collect();
            concatenate(Axis(0), &views)
                .map_err(|e| FeatureError::DimensionMismatch(e.to_string()))?
        };

        Ok(Self {
            features,
            labels,
            feature_index,
            feature_names,
            files,
        })
    }

    /// The stacked `(n_syllables, n_columns)` matrix.
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Label of each row.
    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    /// Request position of each column, shared by every file.
    pub fn feature_index(&self) -> &[usize] {
        &self.feature_index
    }

    /// The requested feature names that `feature_index` points into.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Row ranges of every file, in batch order.
    pub fn files(&self) -> &[FileRows] {
        &self.files
    }

    /// Files that contributed no rows.
    pub fn skipped_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|file| file.rows.is_empty())
            .map(|file| file.path.as_path())
    }

    /// True for each row with no NaN sentinel.
    pub fn complete_rows(&self) -> Vec<bool> {
        self.features
            .axis_iter(Axis(0))
            .map(|row| row.iter().all(|v| !v.is_nan()))
            .collect()
    }
}

/// Runs one [`ExtractConfig`] over a list of files.
pub struct BatchExtractor {
    extractor: FeatureExtractor,
    config: ExtractConfig,
    format: Option<FileFormat>,
    parallel: bool,
    thread_count: Option<usize>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for BatchExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExtractor")
            .field("config", &self.config)
            .field("format", &self.format)
            .field("parallel", &self.parallel)
            .field("thread_count", &self.thread_count)
            .finish()
    }
}

impl BatchExtractor {
    /// A sequential batch over the built-in catalogue.
    pub fn new(config: ExtractConfig) -> Self {
        let extractor = FeatureExtractor::new().unknown_features(config.unknown_features);
        Self {
            extractor,
            config,
            format: None,
            parallel: false,
            thread_count: None,
            reporter: Arc::new(NullProgressReporter),
        }
    }

    /// Uses `extractor` instead of the built-in one.
    ///
    /// The extractor's own unknown-feature policy applies.
    pub fn with_extractor(mut self, extractor: FeatureExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Decodes every file as `format` instead of inferring it from the extension.
    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Processes files on a rayon pool.
    #[cfg(feature = "parallel-processing")]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Number of worker threads for parallel runs. `None` uses rayon's global pool.
    #[cfg(feature = "parallel-processing")]
    pub fn thread_count(mut self, threads: Option<usize>) -> Self {
        self.thread_count = threads;
        self
    }

    /// Reports progress after every file.
    pub fn progress<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Extracts every file and stacks the results in input order.
    ///
    /// # Errors
    /// The first failing file's error, in input order, or
    /// [`FeatureError::InconsistentColumns`] if files disagree on columns.
    pub fn run<P: AsRef<Path> + Sync>(&self, files: &[P]) -> FeatureResult<FeatureTable> {
        self.config.validate()?;
        let feature_names = self.config.expanded_features();
        let total = files.len();
        let completed = AtomicUsize::new(0);
        let started = Instant::now();
        self.reporter.start(total);

        let job = |path: &P| {
            let path = path.as_ref();
            let result = self.extract_one(path, &feature_names);
            self.reporter.report_progress(&ProgressInfo {
                completed: completed.fetch_add(1, Ordering::SeqCst) + 1,
                total,
                file: path.to_path_buf(),
                elapsed: started.elapsed(),
            });
            result.map(|output| (path.to_path_buf(), output))
        };

        let results = self.dispatch(files, job)?;
        self.reporter.finish(started.elapsed());

        let outputs = results.into_iter().collect::<FeatureResult<Vec<_>>>()?;
        let table = FeatureTable::from_outputs(feature_names, outputs)?;
        debug!(
            files = total,
            skipped = table.skipped_files().count(),
            rows = table.labels().len(),
            columns = table.feature_index().len(),
            "batch extraction finished"
        );
        Ok(table)
    }

    fn extract_one(
        &self,
        path: &Path,
        feature_names: &[String],
    ) -> FeatureResult<Option<ExtractionOutput>> {
        let format = match self.format {
            Some(format) => format,
            None => FileFormat::from_path(path)?,
        };
        self.extractor.extract(
            path,
            format,
            feature_names,
            &self.config.spect_params,
            &self.config.labels_to_use,
            &self.config.segment_params,
        )
    }

    #[cfg(feature = "parallel-processing")]
    fn dispatch<P, R, F>(&self, files: &[P], job: F) -> FeatureResult<Vec<R>>
    where
        P: Sync,
        R: Send,
        F: Fn(&P) -> R + Sync + Send,
    {
        if self.parallel {
            parallel::process_parallel(files, self.thread_count, job)
        } else {
            Ok(files.iter().map(job).collect())
        }
    }

    #[cfg(not(feature = "parallel-processing"))]
    fn dispatch<P, R, F>(&self, files: &[P], job: F) -> FeatureResult<Vec<R>>
    where
        F: Fn(&P) -> R,
    {
        Ok(files.iter().map(job).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{decoded_with, syllable_spec, tone_spec, write_annotated_wav};
    use crate::types::LabelSelection;
    use ndarray::array;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_batch(dir: &TempDir) -> Vec<PathBuf> {
        let songs = [
            vec![syllable_spec('a', 0.05), syllable_spec('b', 0.04)],
            vec![syllable_spec('z', 0.05)],
            vec![
                tone_spec('a', 0.06, 3_000.0),
                syllable_spec('b', 0.05),
                syllable_spec('a', 0.04),
            ],
        ];
        songs
            .iter()
            .enumerate()
            .map(|(i, specs)| {
                let path = dir.path().join(format!("song_{i}.wav"));
                write_annotated_wav(&path, &decoded_with(specs));
                path
            })
            .collect()
    }

    fn config() -> ExtractConfig {
        ExtractConfig {
            feature_list: vec![
                "duration".to_string(),
                "mean spectral centroid".to_string(),
                "duration group".to_string(),
            ],
            labels_to_use: LabelSelection::from("ab"),
            ..Default::default()
        }
    }

    #[test]
    fn test_sequential_batch_stacks_files() {
        let dir = TempDir::new().unwrap();
        let files = write_batch(&dir);
        let table = BatchExtractor::new(config()).run(&files).unwrap();

        assert_eq!(table.features().dim(), (5, 3));
        assert_eq!(table.labels(), &['a', 'b', 'a', 'b', 'a']);
        assert_eq!(table.feature_index(), &[0, 1, 2]);
        assert_eq!(table.files()[0].rows, 0..2);
        assert_eq!(table.files()[2].rows, 2..5);
        let skipped: Vec<&Path> = table.skipped_files().collect();
        assert_eq!(skipped, vec![files[1].as_path()]);
        assert!(table.complete_rows().iter().all(|&c| c));
    }

    #[test]
    fn test_progress_reported_per_file() {
        let dir = TempDir::new().unwrap();
        let files = write_batch(&dir);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        BatchExtractor::new(config())
            .progress(CallbackProgressReporter::new(move |info: &ProgressInfo| {
                sink.lock().unwrap().push((info.completed, info.total));
            }))
            .run(&files)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_decode_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let mut files = write_batch(&dir);
        let bogus = dir.path().join("notes.txt");
        std::fs::write(&bogus, "not audio").unwrap();
        files.push(bogus);

        let err = BatchExtractor::new(config()).run(&files).unwrap_err();
        assert!(matches!(err, FeatureError::Decode { .. }));
    }

    #[test]
    fn test_inconsistent_columns_rejected() {
        let first = ExtractionOutput::new(array![[1.0, 2.0]], vec!['a'], vec![0, 1]).unwrap();
        let second = ExtractionOutput::new(array![[1.0]], vec!['b'], vec![0]).unwrap();
        let err = FeatureTable::from_outputs(
            vec!["a".to_string(), "b".to_string()],
            [
                (PathBuf::from("one.wav"), Some(first)),
                (PathBuf::from("two.wav"), Some(second)),
            ],
        )
        .unwrap_err();
        assert!(
            matches!(err, FeatureError::InconsistentColumns { ref path, .. } if path == Path::new("two.wav"))
        );
    }

    #[test]
    fn test_file_without_spectrograms_keeps_vector_width() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.wav");
        write_annotated_wav(&good, &decoded_with(&[syllable_spec('a', 0.05), syllable_spec('a', 0.05)]));
        // its only 'a' is shorter than one spectrogram window
        let short = dir.path().join("short.wav");
        write_annotated_wav(&short, &decoded_with(&[syllable_spec('a', 0.005), syllable_spec('b', 0.05)]));

        let config = ExtractConfig {
            feature_list: vec!["duration group".to_string(), "mean spectrum".to_string()],
            labels_to_use: LabelSelection::from("a"),
            ..Default::default()
        };
        let table = BatchExtractor::new(config.clone()).run(&[&good, &short]).unwrap();

        let k = crate::spectrogram::band_bin_count(&config.spect_params, 32_000).unwrap();
        assert_eq!(table.features().dim(), (3, 1 + k));
        assert_eq!(table.feature_index().len(), 1 + k);
        assert_eq!(table.complete_rows(), vec![true, true, false]);
        let short_row = table.features().row(2).to_owned();
        assert!((short_row[0] - 0.005).abs() < 1e-9);
        assert!(short_row.iter().skip(1).all(|v| v.is_nan()));
    }

    #[test]
    fn test_all_files_skipped() {
        let table = FeatureTable::from_outputs(
            vec!["duration".to_string()],
            [(PathBuf::from("quiet.wav"), None)],
        )
        .unwrap();
        assert_eq!(table.features().nrows(), 0);
        assert_eq!(table.skipped_files().count(), 1);
    }

    #[cfg(feature = "parallel-processing")]
    #[test]
    fn test_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let files = write_batch(&dir);
        let sequential = BatchExtractor::new(config()).run(&files).unwrap();
        let parallel = BatchExtractor::new(config())
            .parallel(true)
            .thread_count(Some(2))
            .run(&files)
            .unwrap();
        assert_eq!(sequential.labels(), parallel.labels());
        assert_eq!(sequential.files(), parallel.files());
        for (a, b) in sequential.features().iter().zip(parallel.features()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
