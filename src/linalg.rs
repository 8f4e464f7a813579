//! Numeric primitives shared by the covariance-based tests.
//!
//! These are thin wrappers around [`nalgebra`] so every test makes the same choices about
//! tolerances and about what counts as singular.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, Dyn, SVD};

/// Singular values below this fraction of the largest one are treated as zero.
pub const RANK_TOLERANCE: f64 = 1e-10;

/// Returns the square submatrix over the given indices, in the requested order.
///
/// ```
/// use indtest::linalg::submatrix;
/// use nalgebra::DMatrix;
///
/// let m = DMatrix::from_row_slice(3, 3, &[
///     1.0, 2.0, 3.0,
///     2.0, 4.0, 5.0,
///     3.0, 5.0, 6.0,
/// ]);
/// let sub = submatrix(&m, &[2, 0]);
/// assert_eq!(sub, DMatrix::from_row_slice(2, 2, &[6.0, 3.0, 3.0, 1.0]));
/// ```
pub fn submatrix(m: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(indices.len(), indices.len(), |i, j| {
        m[(indices[i], indices[j])]
    })
}

/// Returns the rectangular block with the given rows and columns.
pub fn block(m: &DMatrix<f64>, rows: &[usize], columns: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), columns.len(), |i, j| m[(rows[i], columns[j])])
}

/// Iteration cap for the singular value decomposition.
const MAX_SVD_ITERATIONS: usize = 1000;

/// Singular value decomposition which gives up instead of spinning on non-finite input.
fn svd(m: &DMatrix<f64>, vectors: bool) -> Result<SVD<f64, Dyn, Dyn>> {
    if m.iter().any(|x| !x.is_finite()) {
        return Err(Error::Singular);
    }
    SVD::try_new(m.clone(), vectors, vectors, f64::EPSILON, MAX_SVD_ITERATIONS)
        .ok_or(Error::Singular)
}

/// Numerical rank, counting singular values above [`RANK_TOLERANCE`] relative to the largest.
///
/// # Errors
///
/// Returns [`Error::Singular`] if the matrix has non-finite entries or the decomposition
/// doesn't converge.
pub fn rank(m: &DMatrix<f64>) -> Result<usize> {
    if m.is_empty() {
        return Ok(0);
    }
    let svd = svd(m, false)?;
    let largest = svd.singular_values.max();
    if largest <= 0.0 {
        return Ok(0);
    }
    Ok(svd.rank(largest * RANK_TOLERANCE))
}

/// Returns `true` if the matrix is square and has full numerical rank.
pub fn is_full_rank(m: &DMatrix<f64>) -> Result<bool> {
    Ok(m.is_square() && rank(m)? == m.nrows())
}

/// Inverts a square matrix.
///
/// # Errors
///
/// Returns [`Error::Singular`] if the matrix has no inverse, or if the inverse contains
/// non-finite entries.
pub fn inverse(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let inverse = m.clone().try_inverse().ok_or(Error::Singular)?;
    if inverse.iter().all(|x| x.is_finite()) {
        Ok(inverse)
    } else {
        Err(Error::Singular)
    }
}

/// Moore-Penrose pseudo-inverse, which exists for every finite matrix.
///
/// # Errors
///
/// Returns [`Error::Singular`] if the matrix has non-finite entries or the decomposition
/// doesn't converge.
pub fn pseudo_inverse(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if m.is_empty() {
        return Ok(m.clone());
    }
    let svd = svd(m, true)?;
    let largest = svd.singular_values.max();
    svd.pseudo_inverse(largest * RANK_TOLERANCE)
        .map_err(|_| Error::Singular)
}

/// Determinant of a square matrix.
pub fn determinant(m: &DMatrix<f64>) -> f64 {
    m.determinant()
}

/// Partial correlation between the first two variables of a covariance (or correlation)
/// submatrix, conditioning on all the rest, read off the precision matrix.
///
/// ```
/// use indtest::linalg::partial_correlation;
/// use nalgebra::DMatrix;
///
/// // With nothing to condition on, this is the ordinary correlation.
/// let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 1.0]);
/// assert!((partial_correlation(&cov).unwrap() - 0.5).abs() < 1e-12);
/// ```
///
/// # Errors
///
/// Returns [`Error::Singular`] if the submatrix can't be inverted.
pub fn partial_correlation(sub: &DMatrix<f64>) -> Result<f64> {
    let inverse = inverse(sub)?;
    let r = -inverse[(0, 1)] / (inverse[(0, 0)] * inverse[(1, 1)]).sqrt();
    if r.is_finite() {
        Ok(r)
    } else {
        Err(Error::Singular)
    }
}

/// The residual covariance of the first two variables after regressing both on the rest, using
/// the pseudo-inverse so that a rank-deficient conditioning block still gives an answer.
///
/// Returns the 2×2 matrix `Σ_aa - Σ_az Σ_zz⁺ Σ_za`.
///
/// # Errors
///
/// Fails like [`pseudo_inverse`] on the conditioning block.
pub fn residual_covariance(sub: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = sub.nrows();
    let pair = sub.view((0, 0), (2, 2)).into_owned();
    if n == 2 {
        return Ok(pair);
    }
    let cross = sub.view((0, 2), (2, n - 2)).into_owned();
    let rest = sub.view((2, 2), (n - 2, n - 2)).into_owned();
    Ok(pair - &cross * pseudo_inverse(&rest)? * cross.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn three_by_three() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.0, 0.5, 0.3, 0.5, 1.0, 0.2, 0.3, 0.2, 1.0])
    }

    #[test]
    fn partial_correlation_matches_recursive_formula() {
        let m = three_by_three();
        let (r01, r02, r12): (f64, f64, f64) = (0.5, 0.3, 0.2);
        let expected = (r01 - r02 * r12) / ((1.0 - r02 * r02) * (1.0 - r12 * r12)).sqrt();
        assert_abs_diff_eq!(partial_correlation(&m).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn residual_covariance_agrees_with_inverse_when_invertible() {
        let m = three_by_three();
        let res = residual_covariance(&m).unwrap();
        let r = res[(0, 1)] / (res[(0, 0)] * res[(1, 1)]).sqrt();
        assert_abs_diff_eq!(r, partial_correlation(&m).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_is_detected() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(rank(&m), Ok(1));
        assert_eq!(is_full_rank(&m), Ok(false));
        assert_eq!(partial_correlation(&m), Err(Error::Singular));
    }

    #[test]
    fn non_finite_matrices_fail_instead_of_hanging() {
        let mut m = three_by_three();
        m[(0, 1)] = f64::NAN;
        m[(1, 0)] = f64::NAN;
        assert_eq!(rank(&m), Err(Error::Singular));
        assert_eq!(is_full_rank(&m), Err(Error::Singular));
        assert_eq!(pseudo_inverse(&m), Err(Error::Singular));
        m[(0, 1)] = f64::INFINITY;
        m[(1, 0)] = f64::INFINITY;
        assert_eq!(residual_covariance(&m), Err(Error::Singular));
    }

    #[test]
    fn pseudo_inverse_of_a_rank_one_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let pinv = pseudo_inverse(&m).unwrap();
        for x in pinv.iter() {
            assert_abs_diff_eq!(*x, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn block_and_submatrix_agree() {
        let m = three_by_three();
        assert_eq!(block(&m, &[1, 2], &[1, 2]), submatrix(&m, &[1, 2]));
        assert_abs_diff_eq!(determinant(&submatrix(&m, &[0, 1])), 0.75, epsilon = 1e-12);
    }
}
