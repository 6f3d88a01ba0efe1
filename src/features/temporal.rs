//! Waveform-domain features of a single syllable.

use super::{FeatureValue, SingleSyllableFn, fifth_delta, nan_mean};
use crate::FeatureResult;
use crate::recording::Syllable;
use crate::segment::smooth_rectified;

pub(super) const FEATURES: &[(&str, SingleSyllableFn)] = &[
    ("duration", duration),
    ("zero crossings", zero_crossings),
    ("mean smoothed rectified amplitude", mean_smoothed_rectified_amplitude),
    ("mean RMS amplitude", mean_rms_amplitude),
    ("delta smoothed rectified amplitude", delta_smoothed_rectified_amplitude),
];

/// Syllable duration in seconds.
pub fn duration(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    Ok(FeatureValue::Scalar(syllable.duration_s()))
}

/// Number of sign changes in the syllable waveform.
pub fn zero_crossings(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let samples = syllable.samples();
    let crossings = samples
        .iter()
        .zip(samples.iter().skip(1))
        .filter(|&(&prev, &curr)| (prev > 0.0 && curr <= 0.0) || (prev <= 0.0 && curr > 0.0))
        .count();
    Ok(FeatureValue::Scalar(crossings as f64))
}

fn smoothed(syllable: &Syllable) -> Vec<f64> {
    let samples = syllable.samples().to_vec();
    smooth_rectified(
        &samples,
        syllable.sample_rate(),
        syllable.params().smoothing_window_ms,
    )
}

pub fn mean_smoothed_rectified_amplitude(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    Ok(FeatureValue::Scalar(nan_mean(smoothed(syllable))))
}

pub fn delta_smoothed_rectified_amplitude(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    Ok(FeatureValue::Scalar(fifth_delta(&smoothed(syllable))))
}

/// Root mean square of the syllable waveform.
pub fn mean_rms_amplitude(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let rms = nan_mean(syllable.samples().iter().map(|x| x * x)).sqrt();
    Ok(FeatureValue::Scalar(rms))
}
