//! Dense symmetric linear algebra on row-major `f64` buffers
//!
//! Only what the Fréchet distance needs: symmetric eigen-decomposition by
//! cyclic Jacobi rotations, PSD square roots, products and traces.

use simet_core::{Error, Result};

/// Maximum number of full Jacobi sweeps before giving up
pub const MAX_SWEEPS: usize = 100;

/// Off-diagonal Frobenius norm, relative to the whole matrix, that counts as diagonal
const CONVERGENCE_TOLERANCE: f64 = 1e-12;

/// Relative magnitude below which negative eigenvalues are rounding noise
pub const NEGATIVE_EIGENVALUE_TOLERANCE: f64 = 1e-6;

/// Eigen-decomposition of a symmetric matrix
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues, unordered
    pub values: Vec<f64>,

    /// Eigenvectors as columns of a row-major `n x n` matrix
    pub vectors: Vec<f64>,

    /// Matrix order
    pub n: usize,
}

impl SymmetricEigen {
    /// Rebuild `V diag(f(λ)) Vᵀ`
    pub fn reconstruct_with(&self, f: impl Fn(f64) -> f64) -> Vec<f64> {
        let n = self.n;
        let mapped: Vec<f64> = self.values.iter().map(|&v| f(v)).collect();
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let mut sum = 0.0;
                for k in 0..n {
                    sum += self.vectors[i * n + k] * mapped[k] * self.vectors[j * n + k];
                }
                out[i * n + j] = sum;
                out[j * n + i] = sum;
            }
        }
        out
    }
}

/// Eigen-decomposition of a symmetric `n x n` matrix by cyclic Jacobi rotations
///
/// The input is symmetrised first (`(A + Aᵀ) / 2`) so small asymmetries from
/// floating-point products do not matter. Fails with `NumericInstability` on
/// non-finite input or when the rotations do not converge.
pub fn symmetric_eigen(matrix: &[f64], n: usize) -> Result<SymmetricEigen> {
    if matrix.len() != n * n {
        return Err(Error::shape_mismatch(
            "eigen-decomposition",
            format!("{} entries ({n}x{n})", n * n),
            matrix.len(),
        ));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(Error::numeric("matrix has non-finite entries"));
    }

    let mut a = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            a[i * n + j] = 0.5 * (matrix[i * n + j] + matrix[j * n + i]);
        }
    }

    let mut v = identity(n);
    let scale = frobenius(&a);
    if scale == 0.0 {
        return Ok(SymmetricEigen {
            values: vec![0.0; n],
            vectors: v,
            n,
        });
    }

    for sweep in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a, n) <= CONVERGENCE_TOLERANCE * scale {
            tracing::trace!(sweep, n, "jacobi converged");
            let values = (0..n).map(|i| a[i * n + i]).collect();
            return Ok(SymmetricEigen {
                values,
                vectors: v,
                n,
            });
        }

        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[q * n + q] - a[p * n + p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A <- A J
                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                // A <- Jᵀ A
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                // V <- V J
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(Error::numeric(format!(
        "Jacobi eigen-decomposition of a {n}x{n} matrix did not converge in {MAX_SWEEPS} sweeps"
    )))
}

/// Clamp rounding-noise negative eigenvalues to zero
///
/// Negative values larger than `NEGATIVE_EIGENVALUE_TOLERANCE * max(1, max|λ|)`
/// indicate a matrix that is not positive semi-definite and are an error.
pub fn clamp_eigenvalues(values: &[f64], context: &str) -> Result<Vec<f64>> {
    let largest = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tolerance = NEGATIVE_EIGENVALUE_TOLERANCE * largest.max(1.0);

    values
        .iter()
        .map(|&v| {
            if v < -tolerance {
                Err(Error::numeric(format!(
                    "{context}: eigenvalue {v:e} is negative beyond tolerance {tolerance:e}"
                )))
            } else {
                Ok(v.max(0.0))
            }
        })
        .collect()
}

/// Square root of a symmetric positive semi-definite matrix
pub fn sqrt_psd(matrix: &[f64], n: usize) -> Result<Vec<f64>> {
    let mut eigen = symmetric_eigen(matrix, n)?;
    eigen.values = clamp_eigenvalues(&eigen.values, "matrix square root")?;
    Ok(eigen.reconstruct_with(f64::sqrt))
}

/// Trace of the square root of a symmetric PSD matrix: `Σ sqrt(λ)`
pub fn trace_sqrt_psd(matrix: &[f64], n: usize) -> Result<f64> {
    let eigen = symmetric_eigen(matrix, n)?;
    let values = clamp_eigenvalues(&eigen.values, "trace square root")?;
    Ok(values.iter().map(|v| v.sqrt()).sum())
}

/// `A · B` for square `n x n` matrices
pub fn matmul(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for k in 0..n {
            let aik = a[i * n + k];
            if aik == 0.0 {
                continue;
            }
            let row = &b[k * n..(k + 1) * n];
            let dst = &mut out[i * n..(i + 1) * n];
            for (d, bkj) in dst.iter_mut().zip(row) {
                *d += aik * bkj;
            }
        }
    }
    out
}

/// Sum of the diagonal
pub fn trace(matrix: &[f64], n: usize) -> f64 {
    (0..n).map(|i| matrix[i * n + i]).sum()
}

/// Squared Euclidean distance between two vectors
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn identity(n: usize) -> Vec<f64> {
    let mut m = vec![0.0; n * n];
    for i in 0..n {
        m[i * n + i] = 1.0;
    }
    m
}

fn frobenius(m: &[f64]) -> f64 {
    m.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn off_diagonal_norm(m: &[f64], n: usize) -> f64 {
    let mut sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                sum += m[i * n + j] * m[i * n + j];
            }
        }
    }
    sum.sqrt()
}
