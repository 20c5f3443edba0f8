//! Era-wise feature neutralization.
//!
//! For every era independently:
//! 1. optionally Gaussianize each score column (ordinal ranks → normal quantiles),
//! 2. subtract `proportion · E · pinv(E) · S`, the least-squares fit of the
//!    scores on the neutralizer columns,
//! 3. divide by the population standard deviation of the whole residual
//!    matrix (one scalar per era, not per column).
//!
//! An era whose residual has zero spread (e.g. a single row) produces
//! non-finite output. That is left visible on purpose for callers to catch;
//! nothing is clamped or zero-filled.

use std::borrow::Cow;

use nalgebra::DMatrix;
use ncl_common::{NclError, NeutralizationConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::linalg::project;
use crate::normalise::gaussianize;
use crate::partition::{partition, Partition};
use crate::table::{RowTable, TableBuilder};

/// Eras above this count are processed on the rayon pool.
const PARALLEL_THRESHOLD: usize = 4;

/// Row order of the neutralized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowOrder {
    /// Same order as the input table.
    #[default]
    Original,
    /// Eras concatenated in first-seen order (rows within an era keep
    /// their relative order).
    GroupFirstSeen,
}

#[derive(Debug, Clone)]
pub struct NeutralizeOptions {
    /// Fraction of the fitted projection to subtract; not range-checked.
    pub proportion: f64,
    /// Gaussianize score columns per era before residualization.
    pub normalize: bool,
    pub era_column: String,
    pub row_order: RowOrder,
    /// Relative singular-value cutoff for the pseudo-inverse.
    pub rcond: f64,
}

impl Default for NeutralizeOptions {
    fn default() -> Self {
        Self {
            proportion: 1.0,
            normalize: true,
            era_column: "era".to_string(),
            row_order: RowOrder::Original,
            rcond: 1e-6,
        }
    }
}

impl NeutralizeOptions {
    pub fn from_config(config: &NeutralizationConfig, era_column: &str) -> Self {
        Self {
            proportion: config.proportion,
            normalize: config.normalize,
            era_column: era_column.to_string(),
            row_order: if config.preserve_row_order {
                RowOrder::Original
            } else {
                RowOrder::GroupFirstSeen
            },
            rcond: config.pinv_rcond,
        }
    }
}

/// Neutralize `columns` against `neutralizers`, era by era.
///
/// Returns a table with one numeric column per score column. Row ids are
/// carried along, so the result can be joined back on id whatever
/// `row_order` is.
///
/// All columns are validated (present, numeric) before any matrix work.
pub fn neutralize<S, T>(
    table: &RowTable,
    columns: &[S],
    neutralizers: &[T],
    opts: &NeutralizeOptions,
) -> Result<RowTable>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    if columns.is_empty() {
        return Err(NclError::EmptySelection("no score columns given".to_string()));
    }

    let keys = table.key_column(&opts.era_column)?;
    let scores = columns
        .iter()
        .map(|c| table.numeric_column(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let exposures = neutralizers
        .iter()
        .map(|c| table.numeric_column(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let parts = partition(&keys);
    debug!(
        rows = table.len(),
        eras = parts.len(),
        scores = scores.len(),
        neutralizers = exposures.len(),
        "Neutralizing"
    );

    let per_era = run_eras(&parts, &scores, &exposures, opts)?;
    assemble(table, columns, &parts, &per_era, opts.row_order)
}

/// Neutralize a single column and return it aligned with the input rows.
pub fn neutralize_column<T: AsRef<str>>(
    table: &RowTable,
    column: &str,
    neutralizers: &[T],
    opts: &NeutralizeOptions,
) -> Result<Vec<f64>> {
    let opts = NeutralizeOptions {
        row_order: RowOrder::Original,
        ..opts.clone()
    };
    let out = neutralize(table, &[column], neutralizers, &opts)?;
    Ok(out.numeric_column(column)?.into_owned())
}

fn run_eras(
    parts: &[Partition],
    scores: &[Cow<'_, [f64]>],
    exposures: &[Cow<'_, [f64]>],
    opts: &NeutralizeOptions,
) -> Result<Vec<DMatrix<f64>>> {
    #[cfg(feature = "parallel")]
    {
        if parts.len() > PARALLEL_THRESHOLD {
            use rayon::prelude::*;
            return parts
                .par_iter()
                .map(|part| neutralize_era(part, scores, exposures, opts))
                .collect();
        }
    }
    parts
        .iter()
        .map(|part| neutralize_era(part, scores, exposures, opts))
        .collect()
}

fn neutralize_era(
    part: &Partition,
    scores: &[Cow<'_, [f64]>],
    exposures: &[Cow<'_, [f64]>],
    opts: &NeutralizeOptions,
) -> Result<DMatrix<f64>> {
    let n = part.len();
    let gather = |col: &[f64]| -> Vec<f64> { part.rows.iter().map(|&r| col[r]).collect() };

    let score_cols: Vec<Vec<f64>> = scores
        .iter()
        .map(|col| {
            let values = gather(col);
            if opts.normalize {
                gaussianize(&values)
            } else {
                values
            }
        })
        .collect();
    let mut s = DMatrix::from_fn(n, score_cols.len(), |i, j| score_cols[j][i]);

    if !exposures.is_empty() {
        let e = DMatrix::from_fn(n, exposures.len(), |i, j| exposures[j][part.rows[i]]);
        let fitted = project(&e, &s, opts.rcond)?;
        s -= fitted * opts.proportion;
    }

    let sd = population_std(s.as_slice());
    if !(sd.is_finite() && sd > 0.0) {
        warn!(
            era = %part.key,
            rows = n,
            std = sd,
            "Residual has no spread; era output is non-finite"
        );
    }
    s /= sd;

    Ok(s)
}

/// Standard deviation with ddof = 0 over every element.
fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

fn assemble<S: AsRef<str>>(
    table: &RowTable,
    columns: &[S],
    parts: &[Partition],
    per_era: &[DMatrix<f64>],
    order: RowOrder,
) -> Result<RowTable> {
    let k = columns.len();
    let (ids, values): (Vec<String>, Vec<Vec<f64>>) = match order {
        RowOrder::Original => {
            let mut values = vec![vec![f64::NAN; table.len()]; k];
            for (part, m) in parts.iter().zip(per_era) {
                for (i, &row) in part.rows.iter().enumerate() {
                    for (j, col) in values.iter_mut().enumerate() {
                        col[row] = m[(i, j)];
                    }
                }
            }
            (table.ids().to_vec(), values)
        }
        RowOrder::GroupFirstSeen => {
            let mut ids = Vec::with_capacity(table.len());
            let mut values = vec![Vec::with_capacity(table.len()); k];
            for (part, m) in parts.iter().zip(per_era) {
                for (i, &row) in part.rows.iter().enumerate() {
                    ids.push(table.ids()[row].clone());
                    for (j, col) in values.iter_mut().enumerate() {
                        col.push(m[(i, j)]);
                    }
                }
            }
            (ids, values)
        }
    };

    columns
        .iter()
        .zip(values)
        .fold(TableBuilder::new(ids), |b, (name, col)| b.numeric(name.as_ref(), col))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn raw_opts() -> NeutralizeOptions {
        NeutralizeOptions {
            normalize: false,
            ..Default::default()
        }
    }

    fn two_era_table() -> RowTable {
        TableBuilder::new(["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"])
            .text("era", ["e1", "e2", "e1", "e2", "e1", "e2", "e1", "e2"])
            .numeric("pred", vec![0.3, 0.9, 0.1, 0.4, 0.8, 0.2, 0.5, 0.7])
            .numeric("alt", vec![1.0, 3.0, 2.0, 5.0, 4.0, 1.0, 3.0, 2.0])
            .numeric("f1", vec![0.0, 1.0, 0.5, 0.25, 1.0, 0.75, 0.25, 0.0])
            .numeric("f2", vec![1.0, 0.0, 0.75, 0.5, 0.0, 0.25, 1.0, 0.5])
            .build()
            .unwrap()
    }

    fn std_of(values: &[f64]) -> f64 {
        population_std(values)
    }

    #[test]
    fn test_shape_invariance() {
        let table = two_era_table();
        let out = neutralize(&table, &["pred", "alt"], &["f1", "f2"], &NeutralizeOptions::default())
            .unwrap();
        assert_eq!(out.len(), table.len());
        assert_eq!(out.column_names(), &["pred".to_string(), "alt".to_string()]);
        assert_eq!(out.ids(), table.ids());
    }

    #[test]
    fn test_constant_neutralizer_removes_era_mean() {
        let table = TableBuilder::new(["a", "b", "c"])
            .text("era", ["e1", "e1", "e1"])
            .numeric("score", vec![1.0, 2.0, 3.0])
            .numeric("flat", vec![1.0, 1.0, 1.0])
            .build()
            .unwrap();
        let out = neutralize(&table, &["score"], &["flat"], &raw_opts()).unwrap();
        let got = out.numeric_column("score").unwrap();
        // residual [-1, 0, 1] / sqrt(2/3)
        let expected = [-1.224744871391589, 0.0, 1.224744871391589];
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() < TOL, "got {}, want {}", g, e);
        }

        // Gaussianized [1,2,3] is already centred, so the answer is the same
        let out = neutralize(&table, &["score"], &["flat"], &NeutralizeOptions::default()).unwrap();
        let got = out.numeric_column("score").unwrap();
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() < 1e-8);
        }
    }

    #[test]
    fn test_partial_proportion_removes_half_the_fit() {
        let table = TableBuilder::new(["a", "b", "c"])
            .text("era", ["e1", "e1", "e1"])
            .numeric("score", vec![1.0, 2.0, 3.0])
            .numeric("flat", vec![1.0, 1.0, 1.0])
            .build()
            .unwrap();
        let opts = NeutralizeOptions {
            proportion: 0.5,
            ..raw_opts()
        };
        let out = neutralize(&table, &["score"], &["flat"], &opts).unwrap();
        let got = out.numeric_column("score").unwrap();
        // [1,2,3] - 0.5 * [2,2,2] = [0,1,2], std sqrt(2/3)
        let expected = [0.0, 1.224744871391589, 2.449489742783178];
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() < TOL, "got {}, want {}", g, e);
        }
    }

    #[test]
    fn test_no_neutralizers_only_rescales() {
        let table = two_era_table();
        let none: [&str; 0] = [];
        let out = neutralize(&table, &["pred"], &none, &raw_opts()).unwrap();
        let got = out.numeric_column("pred").unwrap();

        let e1_rows = [0usize, 2, 4, 6];
        let e1_raw: Vec<f64> = e1_rows.iter().map(|&r| [0.3, 0.9, 0.1, 0.4, 0.8, 0.2, 0.5, 0.7][r]).collect();
        let sd = std_of(&e1_raw);
        for (&row, raw) in e1_rows.iter().zip(e1_raw.iter()) {
            assert!((got[row] - raw / sd).abs() < TOL);
        }
    }

    #[test]
    fn test_unit_std_per_era() {
        let table = two_era_table();
        let out = neutralize(&table, &["pred", "alt"], &["f1", "f2"], &NeutralizeOptions::default())
            .unwrap();
        let pred = out.numeric_column("pred").unwrap();
        let alt = out.numeric_column("alt").unwrap();
        for era_rows in [[0usize, 2, 4, 6], [1, 3, 5, 7]] {
            // one global scalar per era, over every score column
            let all: Vec<f64> = era_rows
                .iter()
                .map(|&r| pred[r])
                .chain(era_rows.iter().map(|&r| alt[r]))
                .collect();
            assert!((std_of(&all) - 1.0).abs() < TOL);
        }
    }

    #[test]
    fn test_full_neutralization_is_orthogonal_to_exposures() {
        let table = two_era_table();
        let out = neutralize(&table, &["pred"], &["f1", "f2"], &raw_opts()).unwrap();
        let pred = out.numeric_column("pred").unwrap();
        let f1 = table.numeric_column("f1").unwrap();
        let f2 = table.numeric_column("f2").unwrap();
        for era_rows in [[0usize, 2, 4, 6], [1, 3, 5, 7]] {
            let dot1: f64 = era_rows.iter().map(|&r| pred[r] * f1[r]).sum();
            let dot2: f64 = era_rows.iter().map(|&r| pred[r] * f2[r]).sum();
            assert!(dot1.abs() < 1e-9, "dot1 = {}", dot1);
            assert!(dot2.abs() < 1e-9, "dot2 = {}", dot2);
        }
    }

    #[test]
    fn test_zero_proportion_skips_projection() {
        let table = two_era_table();
        let none: [&str; 0] = [];
        let opts = NeutralizeOptions { proportion: 0.0, ..raw_opts() };
        let with = neutralize(&table, &["pred"], &["f1", "f2"], &opts).unwrap();
        let without = neutralize(&table, &["pred"], &none, &opts).unwrap();
        let a = with.numeric_column("pred").unwrap();
        let b = without.numeric_column("pred").unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < TOL);
        }
    }

    #[test]
    fn test_group_isolation() {
        let table = two_era_table();
        let before = neutralize(&table, &["pred"], &["f1"], &NeutralizeOptions::default()).unwrap();

        // Perturb every e1 row; e2 output must not move
        let mut changed = table.clone();
        let mut pred = table.numeric_column("pred").unwrap().into_owned();
        for row in [0usize, 2, 4, 6] {
            pred[row] = pred[row] * -3.0 + 11.0;
        }
        changed.add_numeric_column("pred", pred).unwrap();
        let after = neutralize(&changed, &["pred"], &["f1"], &NeutralizeOptions::default()).unwrap();

        let b = before.numeric_column("pred").unwrap();
        let a = after.numeric_column("pred").unwrap();
        for row in [1usize, 3, 5, 7] {
            assert_eq!(a[row], b[row]);
        }
    }

    #[test]
    fn test_row_order_modes() {
        let table = two_era_table();
        let grouped = NeutralizeOptions {
            row_order: RowOrder::GroupFirstSeen,
            ..Default::default()
        };
        let a = neutralize(&table, &["pred"], &["f1"], &NeutralizeOptions::default()).unwrap();
        let b = neutralize(&table, &["pred"], &["f1"], &grouped).unwrap();

        assert_eq!(
            b.ids(),
            &["r0", "r2", "r4", "r6", "r1", "r3", "r5", "r7"].map(String::from)
        );

        // Joined on id, both orders agree
        let a_vals = a.numeric_column("pred").unwrap();
        let b_vals = b.numeric_column("pred").unwrap();
        for (pos, id) in b.ids().iter().enumerate() {
            let orig = a.ids().iter().position(|x| x == id).unwrap();
            assert_eq!(a_vals[orig], b_vals[pos]);
        }
    }

    #[test]
    fn test_single_row_era_is_non_finite() {
        let table = TableBuilder::new(["a", "b", "c", "d"])
            .text("era", ["e1", "e1", "e1", "solo"])
            .numeric("score", vec![0.1, 0.5, 0.9, 0.4])
            .build()
            .unwrap();
        let none: [&str; 0] = [];
        let out = neutralize(&table, &["score"], &none, &NeutralizeOptions::default()).unwrap();
        let got = out.numeric_column("score").unwrap();
        assert!(got[..3].iter().all(|v| v.is_finite()));
        assert!(!got[3].is_finite());
    }

    #[test]
    fn test_rank_deficient_exposures_do_not_blow_up() {
        // More neutralizers than rows, with a duplicated column
        let table = TableBuilder::new(["a", "b", "c"])
            .text("era", ["e", "e", "e"])
            .numeric("score", vec![3.0, 1.0, 2.0])
            .numeric("f1", vec![1.0, 2.0, 3.0])
            .numeric("f2", vec![1.0, 2.0, 3.0])
            .numeric("f3", vec![0.0, 0.0, 0.0])
            .numeric("f4", vec![1.0, 0.0, 1.0])
            .build()
            .unwrap();
        let out = neutralize(
            &table,
            &["score"],
            &["f1", "f2", "f3", "f4"],
            &NeutralizeOptions { proportion: 0.5, ..raw_opts() },
        )
        .unwrap();
        assert!(out.numeric_column("score").unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_missing_columns_fail_fast() {
        let table = two_era_table();
        let none: [&str; 0] = [];
        let bad_era = NeutralizeOptions { era_column: "round".to_string(), ..Default::default() };
        assert!(matches!(
            neutralize(&table, &["pred"], &none, &bad_era),
            Err(NclError::MissingColumn(c)) if c == "round"
        ));
        assert!(matches!(
            neutralize(&table, &["nope"], &none, &NeutralizeOptions::default()),
            Err(NclError::MissingColumn(c)) if c == "nope"
        ));
        assert!(matches!(
            neutralize(&table, &["pred"], &["f1", "f9"], &NeutralizeOptions::default()),
            Err(NclError::MissingColumn(c)) if c == "f9"
        ));
    }

    #[test]
    fn test_non_numeric_neutralizer_rejected() {
        let table = TableBuilder::new(["a", "b"])
            .text("era", ["e", "e"])
            .numeric("score", vec![1.0, 2.0])
            .text("f", ["0.5", "high"])
            .build()
            .unwrap();
        assert!(matches!(
            neutralize(&table, &["score"], &["f"], &NeutralizeOptions::default()),
            Err(NclError::NonNumeric { row_id, .. }) if row_id == "b"
        ));
    }

    #[test]
    fn test_empty_score_columns_rejected() {
        let table = two_era_table();
        let none: [&str; 0] = [];
        assert!(matches!(
            neutralize(&table, &none, &["f1"], &NeutralizeOptions::default()),
            Err(NclError::EmptySelection(_))
        ));
    }

    #[test]
    fn test_neutralize_column_matches_table_output() {
        let table = two_era_table();
        let grouped = NeutralizeOptions {
            row_order: RowOrder::GroupFirstSeen,
            ..Default::default()
        };
        let col = neutralize_column(&table, "pred", &["f1", "f2"], &grouped).unwrap();
        let full = neutralize(&table, &["pred"], &["f1", "f2"], &NeutralizeOptions::default())
            .unwrap();
        assert_eq!(col, full.numeric_column("pred").unwrap().into_owned());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = NeutralizationConfig::default();
        config.preserve_row_order = false;
        config.proportion = 0.75;
        let opts = NeutralizeOptions::from_config(&config, "era_id");
        assert_eq!(opts.row_order, RowOrder::GroupFirstSeen);
        assert_eq!(opts.era_column, "era_id");
        assert!((opts.proportion - 0.75).abs() < 1e-12);
        assert!(opts.normalize);
    }
}
