//! Pseudo-inverse and least-squares projection on top of nalgebra's SVD.

use nalgebra::DMatrix;
use ncl_common::{NclError, Result};

const SVD_MAX_ITERATIONS: usize = 10_000;

/// Moore–Penrose pseudo-inverse.
///
/// Singular values `<= rcond * max_singular_value` are treated as zero, so
/// rank-deficient, all-zero, or wide (`cols >= rows`) inputs are fine.
pub fn pinv(matrix: &DMatrix<f64>, rcond: f64) -> Result<DMatrix<f64>> {
    let (rows, cols) = matrix.shape();
    if rows == 0 || cols == 0 {
        return Ok(DMatrix::zeros(cols, rows));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(NclError::Linalg(
            "exposure matrix contains non-finite values".to_string(),
        ));
    }

    let svd = matrix
        .clone()
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| NclError::Linalg("SVD did not converge".to_string()))?;

    let max_sv = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let cutoff = rcond * max_sv;

    svd.pseudo_inverse(cutoff)
        .map_err(|e| NclError::Linalg(e.to_string()))
}

/// Least-squares fit of `scores` on the column space of `exposures`:
/// `E · pinv(E) · S`.
pub fn project(exposures: &DMatrix<f64>, scores: &DMatrix<f64>, rcond: f64) -> Result<DMatrix<f64>> {
    if exposures.ncols() == 0 {
        return Ok(DMatrix::zeros(scores.nrows(), scores.ncols()));
    }
    let coefficients = pinv(exposures, rcond)? * scores;
    Ok(exposures * coefficients)
}
