use crate::ProjectionError;

const MAX_SWEEPS: usize = 100;

/// Eigendecomposition of a dense symmetric matrix.
pub(crate) struct SymmetricEigen {
    /// Eigenvalues, sorted descending.
    pub values: Vec<f64>,
    /// Eigenvectors as rows, in the same order as `values`.
    pub vectors: Vec<Vec<f64>>,
}

/// Decomposes the `n x n` row-major symmetric matrix `a` using cyclic
/// Jacobi rotations.
///
/// Jacobi is slower than QR-based methods but is simple, numerically
/// stable, and yields orthogonal eigenvectors even for repeated
/// eigenvalues. Matrices here are at most a few hundred rows.
pub(crate) fn symmetric_eigen(mut a: Vec<f64>, n: usize) -> Result<SymmetricEigen, ProjectionError> {
    debug_assert_eq!(a.len(), n * n);
    if a.iter().any(|x| !x.is_finite()) {
        return Err(ProjectionError::NonFinite);
    }

    let mut v = vec![0.0f64; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    let total: f64 = a.iter().map(|x| x * x).sum();
    let mut converged = false;
    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| a[p * n + q] * a[p * n + q])
            .sum();
        if off <= total * 1e-24 || off == 0.0 {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq == 0.0 {
                    continue;
                }
                let app = a[p * n + p];
                let aqq = a[q * n + q];
                let theta = (aqq - app) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A <- A * J
                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                // A <- J^T * A
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                // V <- V * J
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }
    if !converged {
        return Err(ProjectionError::NoConvergence(MAX_SWEEPS));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[j * n + j].total_cmp(&a[i * n + i]));

    let values = order.iter().map(|&i| a[i * n + i]).collect();
    let vectors = order
        .iter()
        .map(|&col| (0..n).map(|row| v[row * n + col]).collect())
        .collect();
    Ok(SymmetricEigen { values, vectors })
}
