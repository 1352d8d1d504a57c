//! Agreement across node reports.
//!
//! Heights use a robust z-score: the distance from the median scaled by the median
//! absolute deviation (MAD). With only a handful of nodes a plain mean/stddev z-score can
//! never exceed 3, so a single wildly wrong node would drag the consensus with it.

use std::collections::HashMap;

/// Scales MAD to a standard deviation for normally distributed data.
const MAD_SCALE: f64 = 1.4826;
/// Scales mean absolute deviation to a standard deviation, used when MAD is zero.
const MEAN_AD_SCALE: f64 = 1.253_314;

#[allow(clippy::cast_precision_loss)]
fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Robust z-score of every value, in input order.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn robust_zscores(values: &[u64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<f64> = values.iter().map(|v| *v as f64).collect();
    sorted.sort_by(f64::total_cmp);
    let center = median(&sorted);

    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - center).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    let mad = median(&deviations);

    let spread = if mad > 0.0 {
        MAD_SCALE * mad
    } else {
        let mean_ad = deviations.iter().sum::<f64>() / deviations.len() as f64;
        MEAN_AD_SCALE * mean_ad
    };

    values
        .iter()
        .map(|v| if spread > 0.0 { (*v as f64 - center) / spread } else { 0.0 })
        .collect()
}

/// Highest reported height whose robust z-score is within `threshold`.
///
/// Returns `None` for an empty report set.
#[must_use]
pub fn consensus_height(heights: &[u64], threshold: f64) -> Option<u64> {
    robust_zscores(heights)
        .into_iter()
        .zip(heights)
        .filter(|(z, _)| z.abs() <= threshold)
        .map(|(_, height)| *height)
        .max()
}

/// Identifier reported by the most nodes. Ties go to the lexicographically smallest
/// identifier; an empty winner means there is no usable majority.
#[must_use]
pub fn majority_identifier(counts: &HashMap<String, usize>) -> Option<&str> {
    counts
        .iter()
        .max_by(|(a_id, a_count), (b_id, b_count)| a_count.cmp(b_count).then_with(|| b_id.cmp(a_id)))
        .map(|(id, _)| id.as_str())
        .filter(|id| !id.is_empty())
}
