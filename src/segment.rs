//! Amplitude-threshold segmentation of song into syllables.
//!
//! Used when a recording has no annotation: the rectified waveform is smoothed,
//! thresholded, short silent gaps are closed and short sounds are dropped.

use crate::config::SegmentParams;
use crate::FeatureResult;

/// Rectifies `samples` and smooths them with a centred boxcar of `window_ms`.
///
/// The output has the same length as the input. The window is at least one sample.
pub fn smooth_rectified(samples: &[f64], sample_rate: u32, window_ms: f64) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let width = ((window_ms / 1000.0) * sample_rate as f64).round().max(1.0) as usize;
    let half = width / 2;
    let n = samples.len();

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in samples {
        acc += x.abs();
        prefix.push(acc);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (lo + width).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Finds syllable onsets and offsets, in seconds.
///
/// # Errors
/// Returns [`crate::FeatureError::InvalidParameter`] if `params` fail validation.
pub fn segment_song(
    samples: &[f64],
    sample_rate: u32,
    params: &SegmentParams,
) -> FeatureResult<(Vec<f64>, Vec<f64>)> {
    params.validate()?;

    let smoothed = smooth_rectified(samples, sample_rate, params.smoothing_window_ms);
    let mut mask: Vec<bool> = smoothed.iter().map(|&a| a > params.threshold).collect();

    let fs = sample_rate as f64;
    let min_silent = (params.min_silent_dur * fs).round() as usize;
    let min_syl = (params.min_syl_dur * fs).round() as usize;

    // Close short gaps first so fragments of one syllable merge before the length filter.
    remove_short_runs(&mut mask, false, min_silent, true);
    remove_short_runs(&mut mask, true, min_syl, false);

    let (onsets, offsets) = runs_of(&mask)
        .into_iter()
        .map(|(start, end)| (start as f64 / fs, end as f64 / fs))
        .unzip();
    Ok((onsets, offsets))
}

/// Half-open `(start, end)` sample ranges where `mask` is true.
fn runs_of(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &v) in mask.iter().enumerate() {
        match (v, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len()));
    }
    runs
}

/// Flips runs of `value` shorter than `min_len` to `!value`.
///
/// With `interior_only`, runs touching either end of the mask are left alone, so
/// leading and trailing silence never turn into sound.
fn remove_short_runs(mask: &mut [bool], value: bool, min_len: usize, interior_only: bool) {
    if min_len == 0 || mask.is_empty() {
        return;
    }

    let mut i = 0usize;
    while i < mask.len() {
        if mask[i] != value {
            i += 1;
            continue;
        }

        let start = i;
        while i < mask.len() && mask[i] == value {
            i += 1;
        }

        let eligible = !interior_only || (start > 0 && i < mask.len());
        if eligible && i - start < min_len {
            for v in &mut mask[start..i] {
                *v = !value;
            }
        }
    }
}
