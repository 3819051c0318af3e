//! Whole-stream transforms applied before resampling.

use super::config::NO_VALUE;

/// Running sum: `out[i] = deltas[0] + … + deltas[i]`.
pub fn accumulate(deltas: &[i64]) -> Vec<i64> {
    deltas
        .iter()
        .scan(0i64, |sum, &delta| {
            *sum = sum.saturating_add(delta);
            Some(*sum)
        })
        .collect()
}

/// Forward-fill [`NO_VALUE`] samples with the last valid reading.
///
/// Leading sentinels take the first valid reading of the stream. A stream
/// without any valid reading is returned unchanged.
pub fn clean_sentinels(values: &[i64]) -> Vec<i64> {
    let Some(mut fill) = values.iter().copied().find(|&v| v != NO_VALUE) else {
        return values.to_vec();
    };
    values
        .iter()
        .map(|&v| {
            if v == NO_VALUE {
                fill
            } else {
                fill = v;
                v
            }
        })
        .collect()
}

pub fn count_sentinels(values: &[i64]) -> usize {
    values.iter().filter(|&&v| v == NO_VALUE).count()
}

/// Sorted union of several offset axes with duplicates collapsed.
pub fn unify_timeline(axes: &[&[i64]]) -> Vec<i64> {
    let mut merged: Vec<i64> = axes.iter().flat_map(|axis| axis.iter().copied()).collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}
