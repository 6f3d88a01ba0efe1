//! Features computed from the band-limited power spectrogram.
//!
//! Frame-wise statistics are computed per spectrogram column and then
//! summarised over time: `mean ...` averages the frame values, `mean delta ...`
//! averages their +/-2 frame regression delta, and the k-NN style `delta ...`
//! features compare the last fifth of the frames with the first fifth.

use super::{FeatureValue, SingleSyllableFn, fifth_delta, nan_mean, regression_delta};
use crate::FeatureResult;
use crate::recording::Syllable;
use crate::spectrogram::Spectrogram;
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Floor added to power before taking logarithms, so silent frames stay finite.
pub(crate) const POWER_FLOOR: f64 = 1e-12;

pub(super) const FEATURES: &[(&str, SingleSyllableFn)] = &[
    ("mean spectrum", mean_spectrum),
    ("mean delta spectrum", mean_delta_spectrum),
    ("mean spectral centroid", mean_spectral_centroid),
    ("mean spectral spread", mean_spectral_spread),
    ("mean spectral skewness", mean_spectral_skewness),
    ("mean spectral kurtosis", mean_spectral_kurtosis),
    ("mean spectral flatness", mean_spectral_flatness),
    ("mean spectral slope", mean_spectral_slope),
    ("mean delta spectral centroid", mean_delta_spectral_centroid),
    ("mean delta spectral spread", mean_delta_spectral_spread),
    ("mean delta spectral skewness", mean_delta_spectral_skewness),
    ("mean delta spectral kurtosis", mean_delta_spectral_kurtosis),
    ("mean delta spectral flatness", mean_delta_spectral_flatness),
    ("mean delta spectral slope", mean_delta_spectral_slope),
    ("mean amplitude", mean_amplitude),
    ("mean delta amplitude", mean_delta_amplitude),
    ("mean spectral entropy", mean_spectral_entropy),
    ("mean hi lo ratio", mean_hi_lo_ratio),
    ("delta spectral entropy", delta_spectral_entropy),
    ("delta hi lo ratio", delta_hi_lo_ratio),
];

/// Vector features with one column per band bin.
pub(super) const BAND_VECTOR_FEATURES: &[&str] = &["mean spectrum", "mean delta spectrum"];

/// Band power in decibels, `(n_band_bins, n_frames)`.
pub(crate) fn log_band_power(spect: &Spectrogram) -> Array2<f64> {
    spect
        .band_power()
        .mapv(|p| 10.0 * (p + POWER_FLOOR).log10())
}

/// Applies `f(frame_power, band_freqs)` to every frame.
fn per_frame(spect: &Spectrogram, f: impl Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64) -> Vec<f64> {
    let freqs = spect.band_freqs();
    spect
        .band_power()
        .axis_iter(Axis(1))
        .map(|frame| f(frame, freqs))
        .collect()
}

/// Centroid, spread, skewness and kurtosis of one frame over frequency.
///
/// All four are NaN for a silent frame; skewness and kurtosis are NaN for a
/// frame with zero spread.
fn moments(frame: ArrayView1<'_, f64>, freqs: ArrayView1<'_, f64>) -> [f64; 4] {
    let total = frame.sum();
    if !(total > 0.0) {
        return [f64::NAN; 4];
    }
    let centroid = frame.iter().zip(freqs).map(|(p, f)| p * f).sum::<f64>() / total;
    let central = |order: i32| {
        frame
            .iter()
            .zip(freqs)
            .map(|(p, f)| p * (f - centroid).powi(order))
            .sum::<f64>()
            / total
    };
    let spread = central(2).sqrt();
    if spread == 0.0 {
        return [centroid, 0.0, f64::NAN, f64::NAN];
    }
    [
        centroid,
        spread,
        central(3) / spread.powi(3),
        central(4) / spread.powi(4),
    ]
}

fn flatness(frame: ArrayView1<'_, f64>, _freqs: ArrayView1<'_, f64>) -> f64 {
    let arithmetic = frame.mean().unwrap_or(f64::NAN);
    if !(arithmetic > 0.0) {
        return f64::NAN;
    }
    let geometric = frame.mapv(|p| (p + POWER_FLOOR).ln()).mean().unwrap_or(f64::NAN).exp();
    geometric / arithmetic
}

/// Least-squares slope of power against frequency, in power per Hz.
fn slope(frame: ArrayView1<'_, f64>, freqs: ArrayView1<'_, f64>) -> f64 {
    let (Some(mean_f), Some(mean_p)) = (freqs.mean(), frame.mean()) else {
        return f64::NAN;
    };
    let (cov, var) = frame
        .iter()
        .zip(freqs)
        .fold((0.0, 0.0), |(cov, var), (p, f)| {
            (cov + (f - mean_f) * (p - mean_p), var + (f - mean_f).powi(2))
        });
    if var == 0.0 { f64::NAN } else { cov / var }
}

fn amplitude(frame: ArrayView1<'_, f64>, _freqs: ArrayView1<'_, f64>) -> f64 {
    10.0 * (frame.sum() + POWER_FLOOR).log10()
}

/// Shannon entropy of the normalised frame spectrum, in bits.
fn entropy(frame: ArrayView1<'_, f64>, _freqs: ArrayView1<'_, f64>) -> f64 {
    let total = frame.sum();
    if !(total > 0.0) {
        return f64::NAN;
    }
    -frame
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| {
            let q = p / total;
            q * q.log2()
        })
        .sum::<f64>()
}

fn hi_lo_ratio(spect: &Spectrogram, split_hz: f64) -> Vec<f64> {
    per_frame(spect, |frame, freqs| {
        let (hi, lo) = frame
            .iter()
            .zip(freqs)
            .fold((0.0, 0.0), |(hi, lo), (&p, &f)| {
                if f >= split_hz { (hi + p, lo) } else { (hi, lo + p) }
            });
        ((hi + POWER_FLOOR) / (lo + POWER_FLOOR)).log10()
    })
}

fn moment_track(spect: &Spectrogram, which: usize) -> Vec<f64> {
    per_frame(spect, |frame, freqs| moments(frame, freqs)[which])
}

fn mean_of(track: Vec<f64>) -> FeatureResult<FeatureValue> {
    Ok(FeatureValue::Scalar(nan_mean(track)))
}

fn mean_delta_of(track: Vec<f64>) -> FeatureResult<FeatureValue> {
    Ok(FeatureValue::Scalar(nan_mean(regression_delta(&track))))
}

/// Time-averaged log power of every band bin.
pub fn mean_spectrum(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let log_power = log_band_power(syllable.spectrogram()?);
    let mean = log_power
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::from_elem(log_power.nrows(), f64::NAN));
    Ok(FeatureValue::Vector(mean))
}

/// Time-averaged regression delta of every band bin's log power.
pub fn mean_delta_spectrum(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let log_power = log_band_power(syllable.spectrogram()?);
    let mean = log_power
        .axis_iter(Axis(0))
        .map(|bin| nan_mean(regression_delta(&bin.to_vec())))
        .collect::<Array1<f64>>();
    Ok(FeatureValue::Vector(mean))
}

pub fn mean_spectral_centroid(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(moment_track(syllable.spectrogram()?, 0))
}

pub fn mean_spectral_spread(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(moment_track(syllable.spectrogram()?, 1))
}

pub fn mean_spectral_skewness(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(moment_track(syllable.spectrogram()?, 2))
}

pub fn mean_spectral_kurtosis(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(moment_track(syllable.spectrogram()?, 3))
}

pub fn mean_spectral_flatness(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(per_frame(syllable.spectrogram()?, flatness))
}

pub fn mean_spectral_slope(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(per_frame(syllable.spectrogram()?, slope))
}

pub fn mean_delta_spectral_centroid(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(moment_track(syllable.spectrogram()?, 0))
}

pub fn mean_delta_spectral_spread(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(moment_track(syllable.spectrogram()?, 1))
}

pub fn mean_delta_spectral_skewness(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(moment_track(syllable.spectrogram()?, 2))
}

pub fn mean_delta_spectral_kurtosis(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(moment_track(syllable.spectrogram()?, 3))
}

pub fn mean_delta_spectral_flatness(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(per_frame(syllable.spectrogram()?, flatness))
}

pub fn mean_delta_spectral_slope(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(per_frame(syllable.spectrogram()?, slope))
}

/// Mean of the per-frame band power in decibels.
pub fn mean_amplitude(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(per_frame(syllable.spectrogram()?, amplitude))
}

pub fn mean_delta_amplitude(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_delta_of(per_frame(syllable.spectrogram()?, amplitude))
}

pub fn mean_spectral_entropy(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    mean_of(per_frame(syllable.spectrogram()?, entropy))
}

/// Mean of `log10(power above split / power below split)` over frames.
pub fn mean_hi_lo_ratio(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let split = syllable.params().hi_lo_split_hz;
    mean_of(hi_lo_ratio(syllable.spectrogram()?, split))
}

pub fn delta_spectral_entropy(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let track = per_frame(syllable.spectrogram()?, entropy);
    Ok(FeatureValue::Scalar(fifth_delta(&track)))
}

pub fn delta_hi_lo_ratio(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let split = syllable.params().hi_lo_split_hz;
    let track = hi_lo_ratio(syllable.spectrogram()?, split);
    Ok(FeatureValue::Scalar(fifth_delta(&track)))
}
