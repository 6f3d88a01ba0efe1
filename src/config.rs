//! Parameter structs for spectrogram computation, segmentation and extraction.
//!
//! All structs are plain `serde` types with defaults, so callers can keep them in
//! whatever configuration format they prefer. Each struct has a `validate()`
//! method that reports [`FeatureError::InvalidParameter`] for out-of-range values.

use crate::features::expand_feature_groups;
use crate::types::{LabelSelection, UnknownFeaturePolicy, WindowType};
use crate::{FeatureError, FeatureResult};
use serde::{Deserialize, Serialize};

/// Parameters shared by every syllable spectrogram of a recording, plus the
/// analysis constants that spectrogram-based features read from the syllable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectParams {
    /// Analysis window length in samples (also the FFT size).
    pub window_size: usize,
    /// Hop between successive windows in samples.
    pub step: usize,
    /// Window function applied to each frame.
    pub window: WindowType,
    /// Band `(low_hz, high_hz)` kept for band-limited features. `None` keeps every bin.
    pub freq_cutoffs: Option<(f64, f64)>,
    /// If set, spectrograms are computed over a window of this many seconds
    /// centred on each syllable instead of over the bare segment.
    pub syl_spect_width: Option<f64>,
    /// Lowest pitch considered by the cepstral pitch estimate, in Hz.
    pub pitch_min_hz: f64,
    /// Highest pitch considered by the cepstral pitch estimate, in Hz.
    pub pitch_max_hz: f64,
    /// Frequency dividing "hi" from "lo" power for the hi/lo ratio, in Hz.
    pub hi_lo_split_hz: f64,
    /// Boxcar length, in milliseconds, for the smoothed rectified amplitude
    /// features. Separate from [`SegmentParams::smoothing_window_ms`], which only
    /// shapes the envelope used to find syllables when there is no annotation.
    pub smoothing_window_ms: f64,
}

impl Default for SpectParams {
    fn default() -> Self {
        Self {
            window_size: 512,
            step: 32,
            window: WindowType::Hanning,
            freq_cutoffs: Some((500.0, 10_000.0)),
            syl_spect_width: None,
            pitch_min_hz: 400.0,
            pitch_max_hz: 4_000.0,
            hi_lo_split_hz: 5_000.0,
            smoothing_window_ms: 2.0,
        }
    }
}

impl SpectParams {
    /// Checks that every parameter is usable.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] describing the first bad value.
    pub fn validate(&self) -> FeatureResult<()> {
        if self.window_size < 2 || self.step == 0 {
            return Err(FeatureError::InvalidParameter(
                "Window size must be at least 2 and step greater than 0".to_string(),
            ));
        }
        if self.step > self.window_size {
            return Err(FeatureError::InvalidParameter(
                "Step cannot be larger than window size".to_string(),
            ));
        }
        if let Some((low, high)) = self.freq_cutoffs {
            if low < 0.0 || high <= low {
                return Err(FeatureError::InvalidParameter(format!(
                    "Invalid frequency cutoffs ({low}, {high})"
                )));
            }
        }
        if let Some(width) = self.syl_spect_width {
            if !(width > 0.0) {
                return Err(FeatureError::InvalidParameter(format!(
                    "syl_spect_width must be positive, got {width}"
                )));
            }
        }
        if self.pitch_min_hz <= 0.0 || self.pitch_max_hz <= self.pitch_min_hz {
            return Err(FeatureError::InvalidParameter(
                "Invalid pitch range".to_string(),
            ));
        }
        if self.hi_lo_split_hz <= 0.0 || self.smoothing_window_ms <= 0.0 {
            return Err(FeatureError::InvalidParameter(
                "hi_lo_split_hz and smoothing_window_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters for decoding recordings and, when no annotation exists, for
/// amplitude-threshold segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Smoothed amplitude above which audio counts as sound, on the [-1, 1] scale.
    pub threshold: f64,
    /// Segments shorter than this many seconds are discarded.
    pub min_syl_dur: f64,
    /// Silent gaps shorter than this many seconds are merged away.
    pub min_silent_dur: f64,
    /// Boxcar length, in milliseconds, of the envelope thresholded by amplitude
    /// segmentation. Annotated recordings never use it; the amplitude features
    /// read [`SpectParams::smoothing_window_ms`].
    pub smoothing_window_ms: f64,
    /// Sample rate assumed for `.cbin` files without a readable `.rec` file.
    pub default_sample_rate: u32,
    /// Number of interleaved channels in `.cbin` files. Only the first is used.
    pub cbin_channels: usize,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            threshold: 5000.0 / 32768.0,
            min_syl_dur: 0.02,
            min_silent_dur: 0.002,
            smoothing_window_ms: 2.0,
            default_sample_rate: 32_000,
            cbin_channels: 1,
        }
    }
}

impl SegmentParams {
    /// Checks that every parameter is usable.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] describing the first bad value.
    pub fn validate(&self) -> FeatureResult<()> {
        if !(self.threshold > 0.0) {
            return Err(FeatureError::InvalidParameter(
                "Segmentation threshold must be positive".to_string(),
            ));
        }
        if self.min_syl_dur < 0.0 || self.min_silent_dur < 0.0 {
            return Err(FeatureError::InvalidParameter(
                "Minimum durations cannot be negative".to_string(),
            ));
        }
        if self.smoothing_window_ms <= 0.0 {
            return Err(FeatureError::InvalidParameter(
                "smoothing_window_ms must be positive".to_string(),
            ));
        }
        if self.default_sample_rate == 0 || self.cbin_channels == 0 {
            return Err(FeatureError::InvalidParameter(
                "default_sample_rate and cbin_channels must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything one extraction run needs besides the file list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Requested features in column order. May contain the group names `"svm"` and `"knn"`.
    pub feature_list: Vec<String>,
    /// Spectrogram and analysis parameters.
    pub spect_params: SpectParams,
    /// Decoding and segmentation parameters.
    pub segment_params: SegmentParams,
    /// Label allow-list.
    pub labels_to_use: LabelSelection,
    /// Handling of names found in neither feature catalogue.
    pub unknown_features: UnknownFeaturePolicy,
}

impl ExtractConfig {
    /// Parses a configuration from a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] if the JSON is malformed or a
    /// value fails validation.
    pub fn from_json_str(json: &str) -> FeatureResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FeatureError::InvalidParameter(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the nested parameter structs.
    ///
    /// # Errors
    /// Returns the first validation failure.
    pub fn validate(&self) -> FeatureResult<()> {
        self.spect_params.validate()?;
        self.segment_params.validate()
    }

    /// The feature list with `"svm"` / `"knn"` group names expanded in place.
    pub fn expanded_features(&self) -> Vec<String> {
        expand_feature_groups(&self.feature_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_windows_are_independent() {
        let config = ExtractConfig::from_json_str(
            r#"{"segment_params": {"smoothing_window_ms": 5.0}}"#,
        )
        .unwrap();
        assert_eq!(config.segment_params.smoothing_window_ms, 5.0);
        assert_eq!(config.spect_params.smoothing_window_ms, 2.0);
    }

    #[test]
    fn test_default_config() {
        let config = ExtractConfig::default();
        assert_eq!(config.spect_params.window_size, 512);
        assert_eq!(config.spect_params.step, 32);
        assert_eq!(config.spect_params.freq_cutoffs, Some((500.0, 10_000.0)));
        assert_eq!(config.labels_to_use, LabelSelection::All);
        assert_eq!(config.unknown_features, UnknownFeaturePolicy::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_config() {
        let config = ExtractConfig::from_json_str(
            r#"{
                "feature_list": ["mean spectrum", "duration group"],
                "labels_to_use": "iabcdef",
                "spect_params": {"window_size": 256, "step": 64, "window": "hamming"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.feature_list.len(), 2);
        assert_eq!(config.spect_params.window_size, 256);
        assert_eq!(config.spect_params.window, WindowType::Hamming);
        // untouched fields keep their defaults
        assert_eq!(config.spect_params.pitch_max_hz, 4_000.0);
        assert!(config.labels_to_use.contains('f'));
        assert!(!config.labels_to_use.contains('g'));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ExtractConfig {
            feature_list: vec!["knn".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed = ExtractConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_spect_params() {
        let params = SpectParams {
            step: 1024,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(FeatureError::InvalidParameter(_))
        ));

        let params = SpectParams {
            freq_cutoffs: Some((8000.0, 500.0)),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_invalid_json_reports_parameter_error() {
        let err = ExtractConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, FeatureError::InvalidParameter(_)));
    }

    #[test]
    fn test_expanded_features() {
        let config = ExtractConfig {
            feature_list: vec!["duration".to_string(), "knn".to_string()],
            ..Default::default()
        };
        let expanded = config.expanded_features();
        assert_eq!(expanded[0], "duration");
        assert_eq!(expanded[1], "duration group");
        assert!(expanded.len() > 2);
    }
}
