//! Projection matrix decomposition into intrinsics, rotation and translation.

use nalgebra::{Matrix3, Matrix3x4, Vector4};

use super::{CalibError, CalibrationParameters};

/// Relative to the cube of the Frobenius norm, so the test ignores the scale of `P`.
const SINGULAR_EPS: f64 = 1e-12;

/// RQ decomposition of a 3x3 matrix.
///
/// Returns `(K, R)` with `K` upper-triangular with a positive diagonal and `R`
/// orthonormal, such that `K * R == m`.
pub fn rq_decompose(m: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    // Row-reversal permutation turns QR of the flipped transpose into RQ.
    let j = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);

    let flipped = j * m.transpose() * j;
    let qr = flipped.qr();

    let mut k = j * qr.r().transpose() * j;
    let mut r = j * qr.q().transpose() * j;

    let mut d = Matrix3::identity();
    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            d[(i, i)] = -1.0;
        }
    }
    k *= d;
    r = d * r;

    (k, r)
}

/// Decompose a 3x4 projection matrix into `K`, `R` and a Euclidean `t`.
///
/// `P` is only defined up to scale, so the result satisfies `K [R | t] ~ P`.
/// The global sign is chosen so focal lengths are positive and `det(R) = +1`.
/// The translation is first recovered as a homogeneous 4-vector whose last
/// component is the scale of `P`, then normalized.
pub fn decompose_projection_matrix(
    p: &Matrix3x4<f64>,
) -> Result<CalibrationParameters, CalibError> {
    let mut p = *p;
    let mut m = p.fixed_view::<3, 3>(0, 0).into_owned();
    let det = m.determinant();
    if det.abs() <= SINGULAR_EPS * m.norm().powi(3) {
        return Err(CalibError::Degenerate);
    }
    if det < 0.0 {
        p = -p;
        m = -m;
    }

    let (k_scaled, r) = rq_decompose(&m);

    let scale = k_scaled[(2, 2)];
    let k = k_scaled / scale;

    // Back-substitution against the fourth column: K * y = p4.
    let y = k
        .solve_upper_triangular(&p.column(3).into_owned())
        .ok_or(CalibError::Degenerate)?;
    let t_homogeneous = Vector4::new(y.x, y.y, y.z, scale);
    let t = t_homogeneous.xyz() / t_homogeneous.w;

    Ok(CalibrationParameters { k, r, t })
}
