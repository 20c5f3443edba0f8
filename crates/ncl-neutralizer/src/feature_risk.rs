//! Feature-risk audit: per-era feature/target correlations and the features
//! whose correlation drifted the most between the early and late eras.
//! Used offline to choose the neutralizer list; not on the submission path.

use std::cmp::Ordering;

use ncl_common::{NclError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::partition::partition;
use crate::table::RowTable;

/// Correlation table indexed by era (rows) and feature (columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraCorrelations {
    pub eras: Vec<String>,
    pub features: Vec<String>,
    /// `values[era][feature]`
    pub values: Vec<Vec<f64>>,
}

impl EraCorrelations {
    pub fn new(eras: Vec<String>, features: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if values.len() != eras.len() {
            return Err(NclError::LengthMismatch {
                column: "eras".to_string(),
                expected: eras.len(),
                actual: values.len(),
            });
        }
        for (era, row) in eras.iter().zip(&values) {
            if row.len() != features.len() {
                return Err(NclError::LengthMismatch {
                    column: era.clone(),
                    expected: features.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self { eras, features, values })
    }

    pub fn get(&self, era: &str, feature: &str) -> Option<f64> {
        let e = self.eras.iter().position(|x| x == era)?;
        let f = self.features.iter().position(|x| x == feature)?;
        Some(self.values[e][f])
    }

    /// Per-feature mean over the given era rows, skipping NaN.
    fn feature_means(&self, era_rows: &[usize]) -> Vec<f64> {
        (0..self.features.len())
            .map(|f| nan_mean(era_rows.iter().map(|&e| self.values[e][f])))
            .collect()
    }
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Pearson correlation over pairs where both values are present.
/// Fewer than two pairs or zero variance gives NaN.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

/// Correlation of each feature with `target`, computed separately per era.
/// Eras are listed in first-seen order.
pub fn era_correlations<S: AsRef<str>>(
    table: &RowTable,
    features: &[S],
    target: &str,
    era_column: &str,
) -> Result<EraCorrelations> {
    let keys = table.key_column(era_column)?;
    let target_values = table.numeric_column(target)?;
    let feature_values = features
        .iter()
        .map(|f| table.numeric_column(f.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let parts = partition(&keys);
    let mut eras = Vec::with_capacity(parts.len());
    let mut values = Vec::with_capacity(parts.len());

    for part in &parts {
        let y: Vec<f64> = part.rows.iter().map(|&r| target_values[r]).collect();
        let row: Vec<f64> = feature_values
            .iter()
            .map(|col| {
                let x: Vec<f64> = part.rows.iter().map(|&r| col[r]).collect();
                pearson(&x, &y)
            })
            .collect();
        eras.push(part.key.clone());
        values.push(row);
    }

    debug!(eras = eras.len(), features = features.len(), "Computed era correlations");

    EraCorrelations::new(
        eras,
        features.iter().map(|f| f.as_ref().to_string()).collect(),
        values,
    )
}

/// Indices of `eras` in ascending key order.
fn sorted_era_order(eras: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..eras.len()).collect();
    let numeric: Option<Vec<f64>> = eras.iter().map(|e| e.trim().parse::<f64>().ok()).collect();
    match numeric {
        Some(keys) => order.sort_by(|&a, &b| {
            keys[a]
                .partial_cmp(&keys[b])
                .unwrap_or(Ordering::Equal)
                .then_with(|| eras[a].cmp(&eras[b]))
        }),
        None => order.sort_by(|&a, &b| eras[a].cmp(&eras[b])),
    }
    order
}

/// The `n` features whose mean correlation changed the most between the
/// first and second half of the (sorted) eras.
///
/// Eras sort numerically when every key parses as a number, otherwise as
/// strings. The split point is `floor(eras / 2)`. Features are ranked by
/// `|mean(second half) - mean(first half)|` descending; equal scores keep
/// their column order and NaN differences rank last.
pub fn biggest_change_features(corrs: &EraCorrelations, n: usize) -> Vec<String> {
    let era_order = sorted_era_order(&corrs.eras);

    let (first_half, second_half) = era_order.split_at(era_order.len() / 2);
    let h1_means = corrs.feature_means(first_half);
    let h2_means = corrs.feature_means(second_half);

    let mut ranked: Vec<(usize, f64)> = h1_means
        .iter()
        .zip(&h2_means)
        .map(|(h1, h2)| (h2 - h1).abs())
        .enumerate()
        .collect();

    ranked.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
        (false, false) => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    });

    ranked
        .into_iter()
        .take(n)
        .map(|(f, _)| corrs.features[f].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableBuilder;
    use pretty_assertions::assert_eq;

    fn corrs(eras: &[&str], features: &[&str], values: Vec<Vec<f64>>) -> EraCorrelations {
        EraCorrelations::new(
            eras.iter().map(|s| s.to_string()).collect(),
            features.iter().map(|s| s.to_string()).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_biggest_change_four_eras() {
        // Rows deliberately out of era order
        let c = corrs(
            &["e3", "e1", "e4", "e2"],
            &["f1", "f2", "f3", "f4"],
            vec![
                vec![-0.1, 0.05, 0.05, 0.02],
                vec![0.1, 0.0, 0.05, -0.02],
                vec![-0.1, 0.05, 0.05, 0.02],
                vec![0.1, 0.0, 0.05, -0.02],
            ],
        );
        assert_eq!(biggest_change_features(&c, 2), vec!["f1", "f2"]);
        assert_eq!(biggest_change_features(&c, 3), vec!["f1", "f2", "f4"]);
    }

    #[test]
    fn test_ties_keep_column_order() {
        let values = vec![vec![0.0, 0.5, 0.0], vec![0.5, 0.0, 0.25]];
        let c = corrs(&["e1", "e2"], &["a", "b", "c"], values.clone());
        assert_eq!(biggest_change_features(&c, 3), vec!["a", "b", "c"]);

        let swapped: Vec<Vec<f64>> = values.iter().map(|r| vec![r[1], r[0], r[2]]).collect();
        let c = corrs(&["e1", "e2"], &["b", "a", "c"], swapped);
        assert_eq!(biggest_change_features(&c, 3), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_numeric_eras_sort_numerically() {
        // "a" flips sign from era 6; "b" is positive only on eras 5..=9.
        // Lexicographic order (1,10,2,...) would put era 10 in the first half.
        let eras: Vec<String> = (1..=10).map(|e| e.to_string()).collect();
        let values: Vec<Vec<f64>> = (1..=10)
            .map(|e| {
                let a = if e <= 5 { 1.0 } else { -1.0 };
                let b = if (5..=9).contains(&e) { 2.0 } else { 0.0 };
                vec![a, b]
            })
            .collect();
        let c = EraCorrelations::new(eras, vec!["a".to_string(), "b".to_string()], values).unwrap();

        let order: Vec<&str> = sorted_era_order(&c.eras)
            .into_iter()
            .map(|i| c.eras[i].as_str())
            .collect();
        assert_eq!(order, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        assert_eq!(biggest_change_features(&c, 1), vec!["a"]);
    }

    #[test]
    fn test_mixed_era_keys_sort_as_text() {
        let eras = vec!["era10".to_string(), "era2".to_string(), "7".to_string()];
        assert_eq!(sorted_era_order(&eras), vec![2, 0, 1]);
    }

    #[test]
    fn test_split_point_is_floor() {
        // x: floor split → |1 - 0| = 1; ceil split would give 2/3
        // y: floor split → |2/3 - 0| = 2/3; ceil split would give 1
        let c = corrs(
            &["e1", "e2", "e3", "e4", "e5"],
            &["y", "x"],
            vec![
                vec![0.0, 0.0],
                vec![0.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 1.0],
                vec![1.0, 1.0],
            ],
        );
        assert_eq!(biggest_change_features(&c, 1), vec!["x"]);
    }

    #[test]
    fn test_nan_means_are_skipped_and_ranked_last() {
        let c = corrs(
            &["e1", "e2", "e3", "e4"],
            &["gappy", "empty", "steady"],
            vec![
                vec![f64::NAN, f64::NAN, 0.1],
                vec![0.0, f64::NAN, 0.1],
                vec![0.5, f64::NAN, 0.2],
                vec![f64::NAN, f64::NAN, 0.2],
            ],
        );
        assert_eq!(biggest_change_features(&c, 3), vec!["gappy", "steady", "empty"]);
    }

    #[test]
    fn test_n_larger_than_features() {
        let c = corrs(&["e1", "e2"], &["a"], vec![vec![0.1], vec![0.2]]);
        assert_eq!(biggest_change_features(&c, 10), vec!["a"]);
        assert!(biggest_change_features(&c, 0).is_empty());
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let bad = EraCorrelations::new(
            vec!["e1".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec![vec![0.1]],
        );
        assert!(matches!(bad, Err(NclError::LengthMismatch { .. })));
    }

    #[test]
    fn test_pearson() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0], &[1.0]).is_nan());
        // NaN pairs are dropped
        assert!((pearson(&[1.0, f64::NAN, 2.0, 3.0], &[1.0, 9.0, 2.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_era_correlations_per_era() {
        let table = TableBuilder::new(["a", "b", "c", "d", "e", "f"])
            .text("era", ["0001", "0002", "0001", "0002", "0001", "0002"])
            .numeric("target", vec![0.0, 1.0, 0.5, 0.5, 1.0, 0.0])
            .numeric("up", vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0])
            .numeric("flat", vec![0.5; 6])
            .build()
            .unwrap();
        let c = era_correlations(&table, &["up", "flat"], "target", "era").unwrap();
        assert_eq!(c.eras, vec!["0001", "0002"]);
        assert!((c.get("0001", "up").unwrap() - 1.0).abs() < 1e-12);
        assert!((c.get("0002", "up").unwrap() + 1.0).abs() < 1e-12);
        assert!(c.get("0001", "flat").unwrap().is_nan());
        assert!(c.get("0003", "up").is_none());
    }

    #[test]
    fn test_era_correlations_missing_target() {
        let table = TableBuilder::new(["a"])
            .text("era", ["e"])
            .numeric("f", vec![1.0])
            .build()
            .unwrap();
        assert!(matches!(
            era_correlations(&table, &["f"], "target", "era"),
            Err(NclError::MissingColumn(c)) if c == "target"
        ));
    }
}
