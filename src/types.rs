//! Supporting enums shared by the recording model, the decoders and the
//! extraction engine.

use crate::{FeatureError, FeatureResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Window functions for spectral analysis.
///
/// Different window types provide different trade-offs between frequency resolution
/// and spectral leakage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Rectangular window (no windowing) - best frequency resolution but high leakage.
    Rectangular,
    /// Hanning window - good general-purpose window with moderate leakage.
    #[default]
    #[serde(alias = "hann")]
    Hanning,
    /// Hamming window - similar to Hanning but slightly different coefficients.
    Hamming,
    /// Blackman window - low leakage but wider main lobe.
    Blackman,
}

/// Recording formats understood by the built-in decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// RIFF/WAVE audio (the format of the Koumura dataset).
    #[serde(alias = "koumura")]
    Wav,
    /// evTAF `.cbin` audio: headerless big-endian 16-bit samples.
    #[serde(alias = "evtaf")]
    Cbin,
}

impl FileFormat {
    /// Infers the format from a file extension.
    ///
    /// # Errors
    /// Returns [`FeatureError::Decode`] when the extension is missing or unsupported.
    pub fn from_path(path: &Path) -> FeatureResult<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("wav") => Ok(Self::Wav),
            Some("cbin") => Ok(Self::Cbin),
            Some(other) => Err(FeatureError::decode(
                path,
                format!("unsupported file extension '{other}'"),
            )),
            None => Err(FeatureError::decode(path, "file has no extension")),
        }
    }
}

impl FromStr for FileFormat {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" | "koumura" => Ok(Self::Wav),
            "cbin" | "evtaf" => Ok(Self::Cbin),
            other => Err(FeatureError::InvalidParameter(format!(
                "unsupported file format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wav => f.write_str("wav"),
            Self::Cbin => f.write_str("cbin"),
        }
    }
}

/// Which syllable labels take part in extraction.
///
/// Serialises as a plain string: the literal `"all"` selects every segment,
/// any other string is read as a set of label characters, e.g. `"iabcdef"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LabelSelection {
    /// Every segment is included regardless of its label.
    #[default]
    All,
    /// Only segments whose label is one of these characters.
    Only(Vec<char>),
}

impl LabelSelection {
    /// Returns true if a segment with this label should be included.
    pub fn contains(&self, label: char) -> bool {
        match self {
            Self::All => true,
            Self::Only(labels) => labels.contains(&label),
        }
    }
}

impl From<&str> for LabelSelection {
    fn from(value: &str) -> Self {
        if value == "all" {
            Self::All
        } else {
            Self::Only(value.chars().collect())
        }
    }
}

impl From<String> for LabelSelection {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<LabelSelection> for String {
    fn from(value: LabelSelection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LabelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(labels) => f.write_str(&labels.iter().collect::<String>()),
        }
    }
}

/// What the engine does with a feature name found in neither catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFeaturePolicy {
    /// Skip the feature without any report. It contributes no columns.
    Skip,
    /// Skip the feature and emit one warning naming it.
    #[default]
    Warn,
    /// Fail the extraction with [`FeatureError::UnknownFeature`].
    Error,
}
