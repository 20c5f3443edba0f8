//! Rank-based score transforms.
//!
//! - `ordinal_ranks` / `gaussianize`: per-era Gaussianization applied before
//!   neutralization. Ties are broken by position, never averaged.
//! - `percentile_rank`: the final submission transform. Ties share the
//!   average rank.

use std::cmp::Ordering;

/// NaN sorts after every number; numbers compare normally.
fn nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

/// 1-based ordinal ranks in input order.
/// Equal values are ranked by position, so `[10, 20, 20, 30]` → `[1, 2, 3, 4]`.
pub fn ordinal_ranks(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable: ties keep their original relative order
    order.sort_by(|&a, &b| nan_last(values[a], values[b]));

    let mut ranks = vec![0usize; values.len()];
    for (pos, &idx) in order.iter().enumerate() {
        ranks[idx] = pos + 1;
    }
    ranks
}

/// Map a column to standard-normal quantiles via `ppf((rank - 0.5) / n)`.
///
/// A column that contains NaN cannot be ranked meaningfully and comes back
/// as all NaN.
pub fn gaussianize(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if values.iter().any(|v| v.is_nan()) {
        return vec![f64::NAN; n];
    }
    ordinal_ranks(values)
        .into_iter()
        .map(|r| inverse_normal_cdf((r as f64 - 0.5) / n as f64))
        .collect()
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error < 1.15e-9).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239e0,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838e0,
        -2.549732539343734e0,
        4.374664141464968e0,
        2.938163982698783e0,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996e0,
        3.754408661907416e0,
    ];

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Percentile rank: average rank r in [1, N] for ties, then r / N.
/// NaN inputs stay NaN and do not count towards N.
/// Returns scores in the same order as input.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .collect();
    let n = indexed.len();

    let mut out = vec![f64::NAN; values.len()];
    if n == 0 {
        return out;
    }

    indexed.sort_by(|a, b| nan_last(a.1, b.1));

    let mut i = 0;
    while i < n {
        let mut j = i;
        // Find group of equal scores
        while j + 1 < n && indexed[j].1 == indexed[j + 1].1 {
            j += 1;
        }
        let avg_rank = (i + 1 + j + 1) as f64 / 2.0;
        for item in &indexed[i..=j] {
            out[item.0] = avg_rank / n as f64;
        }
        i = j + 1;
    }

    out
}
