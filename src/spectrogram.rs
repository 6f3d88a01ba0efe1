//! Short-time power spectrograms of syllable waveforms.
//!
//! A [`Spectrogrammer`] pre-plans the FFT and the window once per recording and is
//! then applied to every syllable. Slices shorter than one window fail with
//! [`FeatureError::SegmentTooShort`], which the recording model turns into an
//! "unavailable" marker for that syllable.

use crate::config::SpectParams;
use crate::types::WindowType;
use crate::{FeatureError, FeatureResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::ops::Range;
use std::sync::Arc;

/// Power spectrogram of one waveform slice.
///
/// Rows are frequency bins `0..=window_size / 2`, columns are time frames. The
/// `band` rows are the bins inside the configured frequency cutoffs, which is
/// what band-limited features operate on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    power: Array2<f64>,
    freq_bins: Array1<f64>,
    time_bins: Array1<f64>,
    band: Range<usize>,
    nfft: usize,
    sample_rate: u32,
}

impl Spectrogram {
    /// Full power table, `(window_size / 2 + 1, n_frames)`.
    pub fn power(&self) -> ArrayView2<'_, f64> {
        self.power.view()
    }

    /// Power restricted to the bins inside the frequency cutoffs.
    pub fn band_power(&self) -> ArrayView2<'_, f64> {
        self.power.slice(s![self.band.clone(), ..])
    }

    /// Centre frequency of every bin in Hz.
    pub fn freq_bins(&self) -> ArrayView1<'_, f64> {
        self.freq_bins.view()
    }

    /// Centre frequency of the band-limited bins in Hz.
    pub fn band_freqs(&self) -> ArrayView1<'_, f64> {
        self.freq_bins.slice(s![self.band.clone()])
    }

    /// Centre time of every frame in seconds, relative to the slice start.
    pub fn time_bins(&self) -> ArrayView1<'_, f64> {
        self.time_bins.view()
    }

    /// Number of time frames.
    pub fn n_frames(&self) -> usize {
        self.power.ncols()
    }

    /// Number of frequency bins inside the cutoffs.
    pub fn n_band_bins(&self) -> usize {
        self.band.len()
    }

    /// FFT size the spectrogram was computed with.
    pub const fn nfft(&self) -> usize {
        self.nfft
    }

    /// Sample rate of the source waveform.
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Reusable spectrogram calculator for one sample rate and parameter set.
pub struct Spectrogrammer {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    step: usize,
    sample_rate: u32,
    band: Range<usize>,
    freq_bins: Array1<f64>,
}

impl Spectrogrammer {
    /// Plans the FFT and window for `params` at `sample_rate`.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] if the parameters are invalid or
    /// no FFT bin falls inside the frequency cutoffs.
    pub fn new(sample_rate: u32, params: &SpectParams) -> FeatureResult<Self> {
        params.validate()?;
        if sample_rate == 0 {
            return Err(FeatureError::InvalidParameter(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        let window_size = params.window_size;
        let (freq_bins, band) = frequency_axis(sample_rate, params)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);

        Ok(Self {
            fft,
            window: generate_window(window_size, params.window),
            step: params.step,
            sample_rate,
            band,
            freq_bins,
        })
    }

    /// Minimum number of samples a slice needs to produce one frame.
    pub fn min_samples(&self) -> usize {
        self.window.len()
    }

    /// Computes the power spectrogram of `samples`.
    ///
    /// # Errors
    /// Returns [`FeatureError::SegmentTooShort`] if `samples` is shorter than one window.
    pub fn compute(&self, samples: &[f64]) -> FeatureResult<Spectrogram> {
        let window_size = self.window.len();
        if samples.len() < window_size {
            return Err(FeatureError::SegmentTooShort {
                samples: samples.len(),
                window_size,
            });
        }

        let num_frames = (samples.len() - window_size) / self.step + 1;
        let n_bins = window_size / 2 + 1;
        let mut power = Array2::zeros((n_bins, num_frames));
        let mut frame_buffer = vec![Complex::new(0.0, 0.0); window_size];

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.step;
            let frame = &samples[start..start + window_size];

            for ((slot, &sample), &w) in frame_buffer.iter_mut().zip(frame).zip(&self.window) {
                *slot = Complex::new(sample * w, 0.0);
            }

            self.fft.process(&mut frame_buffer);

            for (freq_idx, value) in frame_buffer[..n_bins].iter().enumerate() {
                power[[freq_idx, frame_idx]] = value.norm_sqr();
            }
        }

        let fs = self.sample_rate as f64;
        let time_bins = Array1::from_iter(
            (0..num_frames).map(|i| (i * self.step) as f64 / fs + window_size as f64 / (2.0 * fs)),
        );

        Ok(Spectrogram {
            power,
            freq_bins: self.freq_bins.clone(),
            time_bins,
            band: self.band.clone(),
            nfft: window_size,
            sample_rate: self.sample_rate,
        })
    }
}

/// Bin centre frequencies and the range of bins inside the cutoffs.
fn frequency_axis(sample_rate: u32, params: &SpectParams) -> FeatureResult<(Array1<f64>, Range<usize>)> {
    let window_size = params.window_size;
    let n_bins = window_size / 2 + 1;
    let bin_width = sample_rate as f64 / window_size as f64;
    let freq_bins = Array1::from_iter((0..n_bins).map(|i| i as f64 * bin_width));

    let band = match params.freq_cutoffs {
        Some((low, high)) => {
            let start = freq_bins.iter().position(|&f| f >= low).unwrap_or(n_bins);
            let end = freq_bins.iter().rposition(|&f| f <= high).map_or(0, |i| i + 1);
            if start >= end {
                return Err(FeatureError::InvalidParameter(format!(
                    "No frequency bins between {low} Hz and {high} Hz at {sample_rate} Hz"
                )));
            }
            start..end
        }
        None => 0..n_bins,
    };
    Ok((freq_bins, band))
}

/// Number of bins inside the frequency cutoffs for `params` at `sample_rate`.
///
/// Equals [`Spectrogram::n_band_bins`] of every spectrogram computed with the
/// same parameters.
///
/// # Errors
/// Returns [`FeatureError::InvalidParameter`] if the parameters are invalid or
/// no bin falls inside the cutoffs.
pub fn band_bin_count(params: &SpectParams, sample_rate: u32) -> FeatureResult<usize> {
    params.validate()?;
    if sample_rate == 0 {
        return Err(FeatureError::InvalidParameter(
            "Sample rate must be greater than 0".to_string(),
        ));
    }
    frequency_axis(sample_rate, params).map(|(_, band)| band.len())
}

/// Computes one power spectrogram without keeping the FFT plan around.
///
/// # Errors
/// See [`Spectrogrammer::new`] and [`Spectrogrammer::compute`].
pub fn compute_spectrogram(
    samples: &[f64],
    sample_rate: u32,
    params: &SpectParams,
) -> FeatureResult<Spectrogram> {
    Spectrogrammer::new(sample_rate, params)?.compute(samples)
}

/// Generate window function coefficients.
fn generate_window(size: usize, window_type: WindowType) -> Vec<f64> {
    let n_max = (size - 1) as f64;
    match window_type {
        WindowType::Rectangular => vec![1.0; size],
        WindowType::Hanning => (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n_max).cos()))
            .collect(),
        WindowType::Hamming => (0..size)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n_max).cos())
            .collect(),
        WindowType::Blackman => (0..size)
            .map(|i| {
                let n = i as f64;
                0.42 - 0.5 * (2.0 * PI * n / n_max).cos() + 0.08 * (4.0 * PI * n / n_max).cos()
            })
            .collect(),
    }
}
