//! Small dense linear algebra helpers for 3×3 problems.
//!
//! Normal estimation only needs the eigen decomposition of a symmetric 3×3
//! covariance matrix, which is computed here with the cyclic Jacobi eigenvalue
//! algorithm: each sweep applies one Givens rotation per off-diagonal pair
//! until the off-diagonal mass vanishes.

use glam::{DMat3, DVec3};

const JACOBI_EPSILON: f64 = 1e-30;
const MAX_SWEEPS: usize = 32;

/// Eigen decomposition of a symmetric 3×3 matrix.
#[derive(Debug, Clone)]
pub struct SymmetricEigen3 {
    /// Eigenvalues sorted in ascending order.
    pub eigenvalues: DVec3,
    /// Unit eigenvectors stored as columns, matching `eigenvalues`.
    pub eigenvectors: DMat3,
}

/// Compute the eigen decomposition of a symmetric 3×3 matrix.
///
/// Only the lower triangle is read.
///
/// Example:
///
/// ```
/// use glam::DMat3;
/// use kinecloud_3d::linalg::symmetric_eigen3;
///
/// let m = DMat3::from_diagonal(glam::DVec3::new(3.0, 1.0, 2.0));
/// let eig = symmetric_eigen3(&m);
/// assert_eq!(eig.eigenvalues.to_array(), [1.0, 2.0, 3.0]);
/// ```
pub fn symmetric_eigen3(m: &DMat3) -> SymmetricEigen3 {
    // row-major working copy, symmetrized from the lower triangle
    let mut a = [[0.0f64; 3]; 3];
    for (i, row) in a.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            let (r, c) = if i >= j { (i, j) } else { (j, i) };
            *val = m.col(c)[r];
        }
    }
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    for _ in 0..MAX_SWEEPS {
        let off = a[0][1].powi(2) + a[0][2].powi(2) + a[1][2].powi(2);
        if off < JACOBI_EPSILON {
            break;
        }
        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            if a[p][q] == 0.0 {
                continue;
            }
            let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;

            // A <- A * J
            for row in a.iter_mut() {
                let (akp, akq) = (row[p], row[q]);
                row[p] = c * akp - s * akq;
                row[q] = s * akp + c * akq;
            }
            // A <- J^T * A
            for k in 0..3 {
                let (apk, aqk) = (a[p][k], a[q][k]);
                a[p][k] = c * apk - s * aqk;
                a[q][k] = s * apk + c * aqk;
            }
            // V <- V * J
            for row in v.iter_mut() {
                let (vkp, vkq) = (row[p], row[q]);
                row[p] = c * vkp - s * vkq;
                row[q] = s * vkp + c * vkq;
            }
        }
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| a[i][i].total_cmp(&a[j][j]));

    let column = |k: usize| DVec3::new(v[0][k], v[1][k], v[2][k]).normalize_or_zero();
    SymmetricEigen3 {
        eigenvalues: DVec3::new(a[order[0]][order[0]], a[order[1]][order[1]], a[order[2]][order[2]]),
        eigenvectors: DMat3::from_cols(column(order[0]), column(order[1]), column(order[2])),
    }
}

/// Covariance matrix of a set of points around their mean.
///
/// Returns `None` for an empty set.
pub fn covariance3(points: &[DVec3]) -> Option<(DVec3, DMat3)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mean = points.iter().copied().sum::<DVec3>() / n;

    let mut cov = DMat3::ZERO;
    for p in points {
        let d = *p - mean;
        cov += DMat3::from_cols(d * d.x, d * d.y, d * d.z);
    }
    Some((mean, cov * (1.0 / n)))
}
