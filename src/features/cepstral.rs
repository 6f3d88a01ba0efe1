//! Cepstral features: mean cepstrum and cepstral pitch.

use super::spectral::POWER_FLOOR;
use super::{FeatureValue, SingleSyllableFn, nan_mean, regression_delta};
use crate::FeatureResult;
use crate::recording::Syllable;
use crate::spectrogram::Spectrogram;
use ndarray::{Array1, Array2, Axis};
use num_complex::Complex;
use rustfft::FftPlanner;

pub(super) const FEATURES: &[(&str, SingleSyllableFn)] = &[
    ("mean cepstrum", mean_cepstrum),
    ("mean delta cepstrum", mean_delta_cepstrum),
    ("mean pitch", mean_pitch),
    ("mean pitch goodness", mean_pitch_goodness),
    ("mean delta pitch", mean_delta_pitch),
    ("mean delta pitch goodness", mean_delta_pitch_goodness),
];

/// Vector features with one column per band bin.
pub(super) const BAND_VECTOR_FEATURES: &[&str] = &["mean cepstrum", "mean delta cepstrum"];

/// Real cepstrum of every frame's band-limited log10 power, `(n_band_bins, n_frames)`.
pub fn band_cepstrum(spect: &Spectrogram) -> Array2<f64> {
    let band = spect.band_power();
    let n = band.nrows();
    let mut out = Array2::zeros(band.raw_dim());
    if n == 0 {
        return out;
    }

    let ifft = FftPlanner::<f64>::new().plan_fft_inverse(n);
    let mut buffer = vec![Complex::new(0.0, 0.0); n];
    for (frame, mut column) in band.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
        for (slot, &p) in buffer.iter_mut().zip(frame) {
            *slot = Complex::new((p + POWER_FLOOR).log10(), 0.0);
        }
        ifft.process(&mut buffer);
        for (c, value) in column.iter_mut().zip(&buffer) {
            *c = value.re / n as f64;
        }
    }
    out
}

/// Per-frame cepstral pitch in Hz and the cepstral peak value.
///
/// Uses the full-band spectrum so quefrency bins map to sample lags. Only
/// lags between `sample_rate / max_hz` and `sample_rate / min_hz` are searched.
pub fn pitch_track(spect: &Spectrogram, min_hz: f64, max_hz: f64) -> (Vec<f64>, Vec<f64>) {
    let power = spect.power();
    let nfft = spect.nfft();
    let fs = spect.sample_rate() as f64;
    let lo = (fs / max_hz).ceil().max(1.0) as usize;
    let hi = ((fs / min_hz).floor() as usize).min(nfft / 2);
    if lo > hi {
        return (vec![f64::NAN; spect.n_frames()], vec![f64::NAN; spect.n_frames()]);
    }

    let ifft = FftPlanner::<f64>::new().plan_fft_inverse(nfft);
    let mut buffer = vec![Complex::new(0.0, 0.0); nfft];
    let mut pitch = Vec::with_capacity(spect.n_frames());
    let mut goodness = Vec::with_capacity(spect.n_frames());

    for frame in power.axis_iter(Axis(1)) {
        for (k, &p) in frame.iter().enumerate() {
            let log_p = Complex::new((p + POWER_FLOOR).ln(), 0.0);
            buffer[k] = log_p;
            if k > 0 && k < nfft - k {
                buffer[nfft - k] = log_p;
            }
        }
        ifft.process(&mut buffer);

        let (peak_lag, peak) = (lo..=hi)
            .map(|q| (q, buffer[q].re / nfft as f64))
            .fold((lo, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        pitch.push(fs / peak_lag as f64);
        goodness.push(peak);
    }
    (pitch, goodness)
}

fn syllable_pitch(syllable: &Syllable) -> FeatureResult<(Vec<f64>, Vec<f64>)> {
    let params = syllable.params();
    Ok(pitch_track(
        syllable.spectrogram()?,
        params.pitch_min_hz,
        params.pitch_max_hz,
    ))
}

pub fn mean_cepstrum(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let cepstrum = band_cepstrum(syllable.spectrogram()?);
    let mean = cepstrum
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::from_elem(cepstrum.nrows(), f64::NAN));
    Ok(FeatureValue::Vector(mean))
}

pub fn mean_delta_cepstrum(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let cepstrum = band_cepstrum(syllable.spectrogram()?);
    let mean = cepstrum
        .axis_iter(Axis(0))
        .map(|coef| nan_mean(regression_delta(&coef.to_vec())))
        .collect::<Array1<f64>>();
    Ok(FeatureValue::Vector(mean))
}

pub fn mean_pitch(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let (pitch, _) = syllable_pitch(syllable)?;
    Ok(FeatureValue::Scalar(nan_mean(pitch)))
}

pub fn mean_pitch_goodness(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let (_, goodness) = syllable_pitch(syllable)?;
    Ok(FeatureValue::Scalar(nan_mean(goodness)))
}

pub fn mean_delta_pitch(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let (pitch, _) = syllable_pitch(syllable)?;
    Ok(FeatureValue::Scalar(nan_mean(regression_delta(&pitch))))
}

pub fn mean_delta_pitch_goodness(syllable: &Syllable) -> FeatureResult<FeatureValue> {
    let (_, goodness) = syllable_pitch(syllable)?;
    Ok(FeatureValue::Scalar(nan_mean(regression_delta(&goodness))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectParams;
    use crate::spectrogram::compute_spectrogram;
    use crate::test_support::{analysed_one, tone_spec};
    use std::f64::consts::PI;

    fn harmonic_stack(f0: f64, fs: u32, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / fs as f64;
                (1..=8).map(|h| (2.0 * PI * f0 * h as f64 * t).sin() / h as f64).sum()
            })
            .collect()
    }

    #[test]
    fn test_pitch_of_harmonic_stack() {
        let params = SpectParams::default();
        let spect = compute_spectrogram(&harmonic_stack(1_000.0, 32_000, 4096), 32_000, &params)
            .unwrap();
        let (pitch, goodness) = pitch_track(&spect, params.pitch_min_hz, params.pitch_max_hz);
        assert_eq!(pitch.len(), spect.n_frames());
        let mean = nan_mean(pitch.iter().copied());
        assert!((mean - 1_000.0).abs() < 50.0, "pitch {mean}");
        assert!(goodness.iter().all(|g| *g > 0.0));
    }

    #[test]
    fn test_pitch_with_odd_window() {
        let params = SpectParams {
            window_size: 511,
            step: 128,
            ..Default::default()
        };
        let spect = compute_spectrogram(&harmonic_stack(1_000.0, 32_000, 4096), 32_000, &params)
            .unwrap();
        assert_eq!(spect.nfft(), 511);
        let (pitch, _) = pitch_track(&spect, params.pitch_min_hz, params.pitch_max_hz);
        let mean = nan_mean(pitch.iter().copied());
        assert!((mean - 1_000.0).abs() < 50.0, "pitch {mean}");
    }

    #[test]
    fn test_pitch_range_outside_nyquist_is_nan() {
        let params = SpectParams::default();
        let spect = compute_spectrogram(&harmonic_stack(1_000.0, 32_000, 1024), 32_000, &params)
            .unwrap();
        // lags above nfft / 2 cannot be searched
        let (pitch, _) = pitch_track(&spect, 1.0, 20.0);
        assert!(pitch.iter().all(|p| p.is_nan()));
    }

    #[test]
    fn test_cepstrum_arity_matches_band() {
        let syllable = analysed_one(tone_spec('a', 0.05, 3_000.0));
        let bins = syllable.spectrogram().unwrap().n_band_bins();
        assert_eq!(mean_cepstrum(&syllable).unwrap().arity(), bins);
        assert_eq!(mean_delta_cepstrum(&syllable).unwrap().arity(), bins);
    }

    #[test]
    fn test_pitch_features_are_scalar() {
        let syllable = analysed_one(tone_spec('a', 0.05, 3_000.0));
        let features: [SingleSyllableFn; 4] = [
            mean_pitch,
            mean_pitch_goodness,
            mean_delta_pitch,
            mean_delta_pitch_goodness,
        ];
        for f in features {
            assert!(matches!(f(&syllable).unwrap(), FeatureValue::Scalar(_)));
        }
    }
}
