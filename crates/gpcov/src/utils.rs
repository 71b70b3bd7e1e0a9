use crate::errors::{GpCovError, Result};
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*};
use log::warn;
use ndarray::{Array2, ArrayBase, Data, Ix1, Ix2};

/// Default relative tolerance under which a Cholesky pivot is considered vanishing
pub const DEGENERACY_TOL: f64 = 1e-10;

/// Lower Cholesky factor `L` of the symmetric positive definite `mat` (`mat = L L^T`).
///
/// Each squared pivot `L_ii^2` is compared to the `mat_ii` diagonal term: when below
/// `tol * |mat_ii|` (or NaN) the matrix is reported as numerically degenerate.
/// `what` names the matrix in the error message.
pub(crate) fn checked_cholesky<F: Float>(
    mat: &ArrayBase<impl Data<Elem = F>, Ix2>,
    tol: F,
    what: &str,
) -> Result<Array2<F>> {
    checked_cholesky_scaled(mat, &mat.diag(), tol, what)
}

/// Lower Cholesky factor `L` of `mat` with squared pivots compared to the `scale` diagonal:
/// `L_ii^2 <= tol * |scale_i|` (or NaN) is reported as numerically degenerate.
///
/// For a Schur complement `Knew - kno K^-1 kno^T`, `scale` is the diagonal of `Knew`
/// before the subtraction.
pub(crate) fn checked_cholesky_scaled<F: Float>(
    mat: &ArrayBase<impl Data<Elem = F>, Ix2>,
    scale: &ArrayBase<impl Data<Elem = F>, Ix1>,
    tol: F,
    what: &str,
) -> Result<Array2<F>> {
    if mat.nrows() == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    let l = mat.cholesky().map_err(|err| {
        warn!("Cholesky decomposition of {what} failed: {err}");
        GpCovError::from(err)
    })?;
    for (i, (p, d)) in l.diag().iter().zip(scale.iter()).enumerate() {
        // written as a negation to catch NaN pivots
        if !(*p * *p > tol * d.abs()) {
            warn!("Vanishing pivot {i} in Cholesky decomposition of {what}: {p}");
            return Err(GpCovError::NumericalDegeneracy(format!(
                "{what} is singular (pivot {i} = {p})"
            )));
        }
    }
    Ok(l)
}

/// Log determinant of `L L^T` given its Cholesky factor `L`
pub(crate) fn chol_log_det<F: Float>(l: &ArrayBase<impl Data<Elem = F>, Ix2>) -> F {
    F::cast(2.) * l.diag().mapv(|v| v.ln()).sum()
}

/// Inverse of `L L^T` given its Cholesky factor `L`: `L^-T L^-1`
pub(crate) fn chol_inverse<F: Float>(l: &Array2<F>) -> Result<Array2<F>> {
    if l.nrows() == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    let li = l.solve_triangular(&Array2::<F>::eye(l.nrows()), UPLO::Lower)?;
    Ok(li.t().dot(&li))
}

/// Symmetric matrix built from the lower triangle (diagonal included) of `mat`
pub(crate) fn mirror_lower<F: Float>(mat: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
    Array2::from_shape_fn(mat.dim(), |(i, j)| {
        if j <= i {
            mat[[i, j]]
        } else {
            mat[[j, i]]
        }
    })
}

/// Whether the inducing points `grid` selects the sparse approximation:
/// an empty or all-zero grid stands for no inducing points.
pub fn is_active_grid<F: Float>(grid: &ArrayBase<impl Data<Elem = F>, Ix1>) -> bool {
    grid.iter().any(|v| *v != F::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn test_checked_cholesky() {
        let mat = array![[4., 2.], [2., 3.]];
        let l = checked_cholesky(&mat, 1e-10, "mat").unwrap();
        assert_abs_diff_eq!(l.dot(&l.t()), mat, epsilon = 1e-12);
        assert_abs_diff_eq!(chol_log_det(&l), 8f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(
            chol_inverse(&l).unwrap().dot(&mat),
            Array2::eye(2),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_checked_cholesky_singular() {
        let mat = array![[1., 1.], [1., 1.]];
        assert!(matches!(
            checked_cholesky(&mat, 1e-10, "mat"),
            Err(GpCovError::NumericalDegeneracy(_))
        ));
        let mat = array![[1., f64::NAN], [f64::NAN, 1.]];
        assert!(matches!(
            checked_cholesky(&mat, 1e-10, "mat"),
            Err(GpCovError::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn test_checked_cholesky_scaled() {
        // tiny but positive after cancellation, degenerate wrt the original scale
        let mat = array![[1e-14]];
        assert!(checked_cholesky(&mat, 1e-10, "mat").is_ok());
        assert!(matches!(
            checked_cholesky_scaled(&mat, &array![1.], 1e-10, "mat"),
            Err(GpCovError::NumericalDegeneracy(_))
        ));
        let mat = array![[0.5, 0.1], [0.1, 0.4]];
        assert!(checked_cholesky_scaled(&mat, &array![1., 1.], 1e-10, "mat").is_ok());
    }

    #[test]
    fn test_mirror_lower() {
        let mat = array![[1., 9.], [2., 3.]];
        assert_eq!(mirror_lower(&mat), array![[1., 2.], [2., 3.]]);
    }

    #[test]
    fn test_active_grid() {
        assert!(!is_active_grid(&Array1::<f64>::zeros(0)));
        assert!(!is_active_grid(&array![0., 0.]));
        assert!(is_active_grid(&array![0., 0.5]));
    }
}
