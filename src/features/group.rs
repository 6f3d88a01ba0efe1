//! Features computed over the whole segmentation at once.
//!
//! Neighbour-based features look at the full segment sequence, so a syllable's
//! predecessor may itself be excluded by the mask. Missing neighbours give 0.

use super::GroupFn;
use crate::{FeatureError, FeatureResult};
use ndarray::Array1;

pub(super) const FEATURES: &[(&str, GroupFn)] = &[
    ("duration group", duration_group),
    ("preceding syllable duration", preceding_syllable_duration),
    ("following syllable duration", following_syllable_duration),
    ("preceding silent gap duration", preceding_silent_gap_duration),
    ("following silent gap duration", following_silent_gap_duration),
];

fn check_lengths(onsets: &[f64], offsets: &[f64], mask: &[bool]) -> FeatureResult<()> {
    if onsets.len() != offsets.len() || onsets.len() != mask.len() {
        return Err(FeatureError::DimensionMismatch(format!(
            "{} onsets, {} offsets and {} mask entries",
            onsets.len(),
            offsets.len(),
            mask.len()
        )));
    }
    Ok(())
}

/// Evaluates `value(i)` for every segment, keeping the included ones.
fn masked(
    onsets: &[f64],
    offsets: &[f64],
    mask: &[bool],
    value: impl Fn(usize) -> f64,
) -> FeatureResult<Array1<f64>> {
    check_lengths(onsets, offsets, mask)?;
    Ok(mask
        .iter()
        .enumerate()
        .filter(|&(_, &used)| used)
        .map(|(i, _)| value(i))
        .collect())
}

pub fn duration_group(onsets: &[f64], offsets: &[f64], mask: &[bool]) -> FeatureResult<Array1<f64>> {
    masked(onsets, offsets, mask, |i| offsets[i] - onsets[i])
}

pub fn preceding_syllable_duration(
    onsets: &[f64],
    offsets: &[f64],
    mask: &[bool],
) -> FeatureResult<Array1<f64>> {
    masked(onsets, offsets, mask, |i| {
        if i == 0 { 0.0 } else { offsets[i - 1] - onsets[i - 1] }
    })
}

pub fn following_syllable_duration(
    onsets: &[f64],
    offsets: &[f64],
    mask: &[bool],
) -> FeatureResult<Array1<f64>> {
    masked(onsets, offsets, mask, |i| {
        if i + 1 == onsets.len() { 0.0 } else { offsets[i + 1] - onsets[i + 1] }
    })
}

pub fn preceding_silent_gap_duration(
    onsets: &[f64],
    offsets: &[f64],
    mask: &[bool],
) -> FeatureResult<Array1<f64>> {
    masked(onsets, offsets, mask, |i| {
        if i == 0 { 0.0 } else { onsets[i] - offsets[i - 1] }
    })
}

pub fn following_silent_gap_duration(
    onsets: &[f64],
    offsets: &[f64],
    mask: &[bool],
) -> FeatureResult<Array1<f64>> {
    masked(onsets, offsets, mask, |i| {
        if i + 1 == onsets.len() { 0.0 } else { onsets[i + 1] - offsets[i] }
    })
}
