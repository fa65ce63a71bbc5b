//! Distribution-shape similarity between value histograms.
//!
//! Each histogram is reduced to the multiset of its frequency values and the
//! two multisets are compared as equally weighted 1-D empirical samples with
//! the first Wasserstein (earth mover's) distance. Value labels play no part:
//! a column of four equally common codes scores 1.0 against any other column of
//! four equally common values. This is a shape heuristic, not a test that the
//! two columns hold the same identifiers.

use crate::histogram::ValueHistogram;

/// Wasserstein-1 distance between two empirical samples with unit weights.
///
/// Computed as the integral of `|F_u(x) - F_v(x)|` over the merged support.
/// Returns `None` if either sample is empty.
pub fn wasserstein_distance(u: &[f64], v: &[f64]) -> Option<f64> {
    if u.is_empty() || v.is_empty() {
        return None;
    }
    let mut u_sorted = u.to_vec();
    let mut v_sorted = v.to_vec();
    u_sorted.sort_by(f64::total_cmp);
    v_sorted.sort_by(f64::total_cmp);

    let mut all = u_sorted.iter().chain(v_sorted.iter()).copied().collect::<Vec<_>>();
    all.sort_by(f64::total_cmp);

    let u_len = u_sorted.len() as f64;
    let v_len = v_sorted.len() as f64;
    let distance = all
        .windows(2)
        .map(|pair| {
            let (x, next) = (pair[0], pair[1]);
            let u_cdf = u_sorted.partition_point(|&value| value <= x) as f64 / u_len;
            let v_cdf = v_sorted.partition_point(|&value| value <= x) as f64 / v_len;
            (u_cdf - v_cdf).abs() * (next - x)
        })
        .sum();
    Some(distance)
}

/// Maps a distance onto `(0, 1]`, reaching 1.0 only at zero distance.
pub fn score_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

pub fn histogram_distance(left: &ValueHistogram, right: &ValueHistogram) -> Option<f64> {
    wasserstein_distance(&left.frequencies(), &right.frequencies())
}

/// Similarity of two histograms, `None` when either one is empty.
pub fn similarity(left: &ValueHistogram, right: &ValueHistogram) -> Option<f64> {
    histogram_distance(left, right).map(score_from_distance)
}
