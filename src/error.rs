//! Error types and result utilities for feature extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type alias for results that may contain a [`FeatureError`].
pub type FeatureResult<T> = Result<T, FeatureError>;

/// Error types that can occur while loading recordings and extracting features.
#[derive(Error, Debug)]
pub enum FeatureError {
    /// Malformed or unsupported audio or annotation input.
    ///
    /// Fatal for the file being processed and always propagated to the caller.
    #[error("Decode error for {path}: {reason}")]
    Decode {
        /// File that failed to decode.
        path: PathBuf,
        /// Why decoding failed.
        reason: String,
    },

    /// Underlying I/O failure while reading a recording or its sidecar files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A segment is shorter than the spectrogram window.
    ///
    /// Raised by the spectrogram routine. The recording model converts it into
    /// an "unavailable" spectrogram for that one syllable.
    #[error("Segment too short: {samples} samples, window needs {window_size}")]
    SegmentTooShort {
        /// Number of samples in the segment.
        samples: usize,
        /// Configured window size in samples.
        window_size: usize,
    },

    /// A feature function asked for a spectrogram that could not be computed.
    #[error("Spectrogram unavailable for syllable at {onset_s:.4} s")]
    SpectrogramUnavailable {
        /// Onset of the syllable in seconds.
        onset_s: f64,
    },

    /// A requested feature name matches neither catalogue.
    #[error("Unknown feature name: {0:?}")]
    UnknownFeature(String),

    /// Invalid parameters were supplied to an operation.
    #[error("Invalid parameter error: {0}")]
    InvalidParameter(String),

    /// Array dimensions don't match expected values.
    ///
    /// Raised when a vector feature changes width between syllables or a group
    /// feature returns the wrong number of values.
    #[error("Dimension mismatch error: {0}")]
    DimensionMismatch(String),

    /// Per-file results disagree on column layout and cannot be stacked.
    #[error("Inconsistent feature columns in {path}: {reason}")]
    InconsistentColumns {
        /// File whose columns differ from the table.
        path: PathBuf,
        /// Description of the difference.
        reason: String,
    },
}

impl FeatureError {
    /// Create a new decode error.
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error only affects a single syllable.
    pub const fn is_per_syllable(&self) -> bool {
        matches!(
            self,
            Self::SegmentTooShort { .. } | Self::SpectrogramUnavailable { .. }
        )
    }
}
