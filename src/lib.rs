// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)]
// Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::box_collection)] // Warns on boxed `Vec`, `String`, etc.
#![warn(clippy::vec_box)] // Avoids using `Vec<Box<T>>` when unnecessary
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::identity_op)] // e.g., `x + 0`, `x * 1`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![warn(clippy::missing_safety_doc)] // Docs for `unsafe` functions
#![warn(clippy::missing_const_for_fn)] // Suggests making eligible functions `const`
#![deny(missing_docs)] // Documentation is a must for release

//! # song_features
//!
//! Per-syllable acoustic feature extraction for segmented birdsong recordings.
//!
//! A recording is decoded together with its segmentation (onsets, offsets and
//! one label character per segment). The caller picks which labels take part
//! and which features to compute; the result is one matrix with a row per
//! included syllable, the labels of those rows, and an index mapping every
//! column back to the feature that produced it.
//!
//! ## Features
//!
//! - `parallel-processing`: process the files of a batch on a rayon pool
//! - `progress-tracking`: indicatif progress bar for batch runs
//!
//! ## Quick Start
//!
//! ```no_run
//! use song_features::{FileFormat, LabelSelection, SegmentParams, SpectParams, extract};
//!
//! # fn main() -> song_features::FeatureResult<()> {
//! let output = extract(
//!     "gy6or6_baseline_230312_0808.138.cbin",
//!     FileFormat::Cbin,
//!     &["mean spectrum", "duration group", "mean pitch"],
//!     &SpectParams::default(),
//!     &LabelSelection::from("iabcdefghjk"),
//!     &SegmentParams::default(),
//! )?;
//!
//! match output {
//!     Some(output) => {
//!         // columns of "duration group", the second requested feature
//!         let durations = output.feature_block(1);
//!         println!("{} syllables, {} columns", output.n_syllables(), output.n_columns());
//!         println!("{durations:?}");
//!     }
//!     None => println!("no syllable carries a requested label"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`FeatureResult`]. Problems with a single
//! syllable (a segment shorter than the spectrogram window) never surface as
//! errors: the syllable's row holds NaN in the affected columns instead, and
//! [`ExtractionOutput::complete_rows`] reports which rows are clean.
//!
//! ```rust
//! use song_features::{ExtractConfig, FeatureError};
//!
//! let result = ExtractConfig::from_json_str(r#"{"spect_params": {"step": 0}}"#);
//! assert!(matches!(result, Err(FeatureError::InvalidParameter(_))));
//! ```
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Skipped
//! files and unknown feature names are reported at `WARN`, per-file progress at
//! `DEBUG` and per-syllable NaN fills at `TRACE`.

pub mod batch;
pub mod config;
pub mod decode;
mod error;
pub mod extract;
pub mod features;
pub mod recording;
pub mod segment;
pub mod spectrogram;
mod types;

#[cfg(test)]
mod test_support;

pub use batch::{BatchExtractor, FeatureTable};
pub use config::{ExtractConfig, SegmentParams, SpectParams};
pub use decode::{BuiltinSource, DecodedRecording, RecordingSource};
pub use error::{FeatureError, FeatureResult};
pub use extract::{ExtractionOutput, FeatureExtractor, extract};
pub use features::{
    ArityFn, FeatureKind, FeatureRegistry, FeatureValue, GroupFn, SingleSyllableFeature,
    SingleSyllableFn, default_registry,
};
pub use recording::{Recording, SpectrogramState, Syllable};
pub use spectrogram::{Spectrogram, compute_spectrogram};
pub use types::{FileFormat, LabelSelection, UnknownFeaturePolicy, WindowType};
