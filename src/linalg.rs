//! # Linear algebra
//!
//! $$
//! A = L L^\top, \qquad A = V \Lambda V^\top \;\Rightarrow\; L = V \Lambda_+^{1/2}
//! $$
//!
use nalgebra::Cholesky;
use nalgebra::DMatrix;
use nalgebra::Dyn;
use nalgebra::SymmetricEigen;

/// Eigenvalues above `-PSD_TOLERANCE` count as non-negative.
pub const PSD_TOLERANCE: f64 = 1e-10;

pub fn is_symmetric(a: &DMatrix<f64>, tol: f64) -> bool {
  if !a.is_square() {
    return false;
  }
  let n = a.nrows();
  (0..n).all(|i| (0..i).all(|j| (a[(i, j)] - a[(j, i)]).abs() <= tol))
}

/// Smallest eigenvalue of a symmetric matrix; `+inf` for an empty one.
pub fn min_eigenvalue(a: &DMatrix<f64>) -> f64 {
  if a.is_empty() {
    return f64::INFINITY;
  }
  SymmetricEigen::new(a.clone())
    .eigenvalues
    .iter()
    .copied()
    .fold(f64::INFINITY, f64::min)
}

pub fn is_positive_semi_definite(a: &DMatrix<f64>) -> bool {
  min_eigenvalue(a) >= -PSD_TOLERANCE
}

/// Any `L` with `L Lᵀ = A` for a symmetric PSD `A`.
///
/// Lower-triangular Cholesky when `A` is positive definite; otherwise the
/// eigen factor with negative round-off eigenvalues clipped to zero.
pub fn psd_factor(a: &DMatrix<f64>) -> DMatrix<f64> {
  if let Some(chol) = a.clone().cholesky() {
    return chol.l();
  }

  let eig = SymmetricEigen::new(a.clone());
  let mut factor = eig.eigenvectors;
  for (j, lambda) in eig.eigenvalues.iter().enumerate() {
    let scale = lambda.max(0.0).sqrt();
    factor.column_mut(j).scale_mut(scale);
  }
  factor
}

/// Cholesky of a covariance matrix, adding growing diagonal jitter when the
/// matrix is numerically singular. `None` after eight failed attempts.
pub fn cholesky_with_jitter(mut sigma: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
  let dim = sigma.nrows();
  let mut jitter = 1e-12;
  for _ in 0..8 {
    if let Some(chol) = sigma.clone().cholesky() {
      return Some(chol);
    }
    for i in 0..dim {
      sigma[(i, i)] += jitter;
    }
    jitter *= 10.0;
  }
  None
}
