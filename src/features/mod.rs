//! Feature function catalogues.
//!
//! Features come in two kinds:
//!
//! - **single-syllable** features map one [`Syllable`] to a scalar or a
//!   fixed-length vector ([`FeatureValue`]);
//! - **group** features see the onsets and offsets of the whole recording plus
//!   the inclusion mask, and return one value per included syllable.
//!
//! A [`FeatureRegistry`] holds one name-to-function map per kind. The built-in
//! catalogue is available through [`default_registry`]; callers who need extra
//! features clone it, register their own functions and hand the result to
//! [`crate::FeatureExtractor::with_registry`].

mod cepstral;
mod group;
mod spectral;
mod temporal;

use crate::config::SpectParams;
use crate::recording::Syllable;
use crate::spectrogram::band_bin_count;
use crate::{FeatureError, FeatureResult};
use ndarray::Array1;
use num_traits::Float;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Value returned by a single-syllable feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// One column.
    Scalar(f64),
    /// `len()` columns. Every syllable must return the same length.
    Vector(Array1<f64>),
}

impl FeatureValue {
    /// Number of matrix columns this value fills.
    pub fn arity(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(values) => values.len(),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Array1<f64>> for FeatureValue {
    fn from(values: Array1<f64>) -> Self {
        Self::Vector(values)
    }
}

/// Signature of a single-syllable feature.
pub type SingleSyllableFn = fn(&Syllable) -> FeatureResult<FeatureValue>;

/// Column count of a vector feature, known from the parameters and sample rate alone.
pub type ArityFn = fn(&SpectParams, u32) -> FeatureResult<usize>;

/// A single-syllable feature function and, for vector features, its declared width.
#[derive(Debug, Clone, Copy)]
pub struct SingleSyllableFeature {
    /// Computes the value for one syllable.
    pub compute: SingleSyllableFn,
    /// Width of the vector result. Lets the engine keep the full width when no
    /// syllable of a recording has a spectrogram.
    pub arity: Option<ArityFn>,
}

/// Signature of a group feature: `(onsets_s, offsets_s, inclusion_mask)`.
///
/// Onsets and offsets cover every segment of the recording. The result has one
/// entry per `true` in the mask, in segment order.
pub type GroupFn = fn(&[f64], &[f64], &[bool]) -> FeatureResult<Array1<f64>>;

/// A resolved feature name.
#[derive(Debug, Clone, Copy)]
pub enum FeatureKind {
    /// Computed per syllable from its waveform or spectrogram.
    SingleSyllable(SingleSyllableFeature),
    /// Computed once over the segmentation.
    Group(GroupFn),
}

/// Name-to-function catalogues for both feature kinds.
///
/// A name is registered in at most one of the two catalogues.
#[derive(Debug, Clone, Default)]
pub struct FeatureRegistry {
    single_syllable: HashMap<String, SingleSyllableFeature>,
    group: HashMap<String, GroupFn>,
}

impl FeatureRegistry {
    /// A registry with no features.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the built-in catalogue.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for &(name, compute) in spectral::FEATURES
            .iter()
            .chain(cepstral::FEATURES)
            .chain(temporal::FEATURES)
        {
            let arity = spectral::BAND_VECTOR_FEATURES
                .iter()
                .chain(cepstral::BAND_VECTOR_FEATURES)
                .any(|&vector| vector == name)
                .then_some(band_bin_count as ArityFn);
            registry
                .single_syllable
                .insert(name.to_string(), SingleSyllableFeature { compute, arity });
        }
        for &(name, f) in group::FEATURES {
            registry.group.insert(name.to_string(), f);
        }
        registry
    }

    /// Adds or replaces a single-syllable feature.
    ///
    /// Its width is taken from the first syllable that produces a value; a
    /// recording where none does gets one NaN column for it.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] if `name` is already a group feature.
    pub fn register_single_syllable(
        &mut self,
        name: impl Into<String>,
        f: SingleSyllableFn,
    ) -> FeatureResult<&mut Self> {
        self.insert_single_syllable(name.into(), SingleSyllableFeature { compute: f, arity: None })
    }

    /// Adds or replaces a vector feature whose width `arity` computes up front.
    ///
    /// Recordings where no syllable produces a value still get `arity` NaN
    /// columns, so column layouts agree across files.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] if `name` is already a group feature.
    pub fn register_vector_feature(
        &mut self,
        name: impl Into<String>,
        f: SingleSyllableFn,
        arity: ArityFn,
    ) -> FeatureResult<&mut Self> {
        self.insert_single_syllable(
            name.into(),
            SingleSyllableFeature {
                compute: f,
                arity: Some(arity),
            },
        )
    }

    fn insert_single_syllable(
        &mut self,
        name: String,
        feature: SingleSyllableFeature,
    ) -> FeatureResult<&mut Self> {
        if self.group.contains_key(&name) {
            return Err(FeatureError::InvalidParameter(format!(
                "'{name}' is already registered as a group feature"
            )));
        }
        self.single_syllable.insert(name, feature);
        Ok(self)
    }

    /// Adds or replaces a group feature.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] if `name` is already a
    /// single-syllable feature.
    pub fn register_group(&mut self, name: impl Into<String>, f: GroupFn) -> FeatureResult<&mut Self> {
        let name = name.into();
        if self.single_syllable.contains_key(&name) {
            return Err(FeatureError::InvalidParameter(format!(
                "'{name}' is already registered as a single-syllable feature"
            )));
        }
        self.group.insert(name, f);
        Ok(self)
    }

    /// Looks `name` up in both catalogues.
    pub fn resolve(&self, name: &str) -> Option<FeatureKind> {
        if let Some(&f) = self.single_syllable.get(name) {
            return Some(FeatureKind::SingleSyllable(f));
        }
        self.group.get(name).map(|&f| FeatureKind::Group(f))
    }

    /// True if `name` is in either catalogue.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Sorted names of the single-syllable catalogue.
    pub fn single_syllable_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.single_syllable.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted names of the group catalogue.
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.group.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<FeatureRegistry>> =
    Lazy::new(|| Arc::new(FeatureRegistry::builtin()));

/// The built-in catalogue, built on first use.
pub fn default_registry() -> Arc<FeatureRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Features used to train the SVM classifier of Tachibana et al. 2014.
pub const SVM_FEATURES: &[&str] = &[
    "mean spectrum",
    "mean delta spectrum",
    "mean cepstrum",
    "mean delta cepstrum",
    "duration",
    "mean spectral centroid",
    "mean spectral spread",
    "mean spectral skewness",
    "mean spectral kurtosis",
    "mean spectral flatness",
    "mean spectral slope",
    "mean pitch",
    "mean pitch goodness",
    "mean delta spectral centroid",
    "mean delta spectral spread",
    "mean delta spectral skewness",
    "mean delta spectral kurtosis",
    "mean delta spectral flatness",
    "mean delta spectral slope",
    "mean delta pitch",
    "mean delta pitch goodness",
    "zero crossings",
    "mean amplitude",
    "mean delta amplitude",
];

/// Features used by the k-nearest-neighbours classifier of Troyer et al.
pub const KNN_FEATURES: &[&str] = &[
    "duration group",
    "preceding syllable duration",
    "following syllable duration",
    "preceding silent gap duration",
    "following silent gap duration",
    "mean smoothed rectified amplitude",
    "mean RMS amplitude",
    "mean spectral entropy",
    "mean hi lo ratio",
    "delta smoothed rectified amplitude",
    "delta spectral entropy",
    "delta hi lo ratio",
];

/// Replaces the group names `"svm"` and `"knn"` by their feature lists, keeping order.
pub fn expand_feature_groups<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(names.len());
    for name in names {
        match name.as_ref() {
            "svm" => expanded.extend(SVM_FEATURES.iter().map(|s| s.to_string())),
            "knn" => expanded.extend(KNN_FEATURES.iter().map(|s| s.to_string())),
            other => expanded.push(other.to_string()),
        }
    }
    expanded
}

/// Mean of the non-NaN values, NaN if there are none.
pub(crate) fn nan_mean<F: Float>(values: impl IntoIterator<Item = F>) -> F {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((F::zero(), 0usize), |(sum, count), v| (sum + v, count + 1));
    match F::from(count) {
        Some(n) if count > 0 => sum / n,
        _ => F::nan(),
    }
}

/// First-order regression delta over +/-2 frames, clamping at the edges.
pub(crate) fn regression_delta<F: Float>(values: &[F]) -> Vec<F> {
    const HALF_WIDTH: usize = 2;
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let denom = F::from(2 * (1..=HALF_WIDTH).map(|k| k * k).sum::<usize>()).unwrap_or(F::one());
    (0..n)
        .map(|t| {
            (1..=HALF_WIDTH).fold(F::zero(), |acc, k| {
                let ahead = values[(t + k).min(n - 1)];
                let behind = values[t.saturating_sub(k)];
                acc + F::from(k).unwrap_or(F::one()) * (ahead - behind)
            }) / denom
        })
        .collect()
}

/// Mean of the last fifth of `values` minus the mean of the first fifth.
pub(crate) fn fifth_delta<F: Float>(values: &[F]) -> F {
    if values.is_empty() {
        return F::nan();
    }
    let fifth = (values.len() / 5).max(1);
    nan_mean(values[values.len() - fifth..].iter().copied())
        - nan_mean(values[..fifth].iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn test_builtin_catalogues_are_disjoint_and_complete() {
        let registry = FeatureRegistry::builtin();
        for name in SVM_FEATURES.iter().chain(KNN_FEATURES) {
            assert!(registry.contains(name), "missing {name}");
        }
        for name in registry.single_syllable_names() {
            assert!(!registry.group_names().contains(&name));
        }
        assert_eq!(registry.group_names().len(), 5);
        assert_eq!(registry.single_syllable_names().len(), 31);
    }

    #[test]
    fn test_resolve_kinds() {
        let registry = default_registry();
        assert!(matches!(
            registry.resolve("mean spectrum"),
            Some(FeatureKind::SingleSyllable(_))
        ));
        assert!(matches!(
            registry.resolve("duration group"),
            Some(FeatureKind::Group(_))
        ));
        assert!(registry.resolve("mean spectum").is_none());
    }

    #[test]
    fn test_register_rejects_cross_catalogue_names() {
        fn one(_: &Syllable) -> FeatureResult<FeatureValue> {
            Ok(FeatureValue::Scalar(1.0))
        }
        let mut registry = FeatureRegistry::builtin();
        assert!(registry.register_single_syllable("duration group", one).is_err());
        registry.register_single_syllable("one", one).unwrap();
        assert!(matches!(
            registry.resolve("one"),
            Some(FeatureKind::SingleSyllable(_))
        ));
        // the shared default is untouched
        assert!(!default_registry().contains("one"));
    }

    #[test]
    fn test_band_vector_features_declare_width() {
        let registry = default_registry();
        let params = SpectParams::default();
        for name in ["mean spectrum", "mean delta spectrum", "mean cepstrum", "mean delta cepstrum"] {
            let Some(FeatureKind::SingleSyllable(feature)) = registry.resolve(name) else {
                panic!("{name} is not a single-syllable feature");
            };
            let arity = feature.arity.expect("vector feature without width");
            assert_eq!(arity(&params, 32_000).unwrap(), band_bin_count(&params, 32_000).unwrap());
        }
        let Some(FeatureKind::SingleSyllable(duration)) = registry.resolve("duration") else {
            panic!("duration is not a single-syllable feature");
        };
        assert!(duration.arity.is_none());
    }

    #[test]
    fn test_expand_feature_groups() {
        let expanded = expand_feature_groups(&["zero crossings", "svm", "knn"]);
        assert_eq!(expanded.len(), 1 + SVM_FEATURES.len() + KNN_FEATURES.len());
        assert_eq!(expanded[0], "zero crossings");
        assert_eq!(expanded[1], "mean spectrum");
        assert_eq!(expanded[1 + SVM_FEATURES.len()], "duration group");
    }

    #[test]
    fn test_nan_mean_skips_nan() {
        assert_approx_eq!(nan_mean([1.0, f64::NAN, 3.0]), 2.0, 1e-12);
        assert!(nan_mean::<f64>([]).is_nan());
        assert!(nan_mean([f64::NAN]).is_nan());
    }

    #[test]
    fn test_regression_delta_of_ramp() {
        let ramp: Vec<f64> = (0..10).map(|i| 3.0 * i as f64).collect();
        let delta = regression_delta(&ramp);
        assert_eq!(delta.len(), 10);
        // interior frames see the full window
        for &d in &delta[2..8] {
            assert_approx_eq!(d, 3.0, 1e-12);
        }
        assert_eq!(regression_delta(&[5.0]), vec![0.0]);
    }

    #[test]
    fn test_fifth_delta() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        // last two minus first two: 8.5 - 0.5
        assert_approx_eq!(fifth_delta(&values), 8.0, 1e-12);
        assert_approx_eq!(fifth_delta(&[2.0, 4.0]), 2.0, 1e-12);
    }
}
