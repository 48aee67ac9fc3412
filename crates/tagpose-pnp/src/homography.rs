use nalgebra::{Matrix3, SMatrix, SVector};

use crate::pnp::PnPError;

/// Compute the homography matrix from four 2d point correspondences.
///
/// Both point sets are conditioned (centroid at the origin, mean distance
/// `sqrt(2)`) before the 8x8 linear system with `h33 = 1` is solved, and the
/// result is scaled to unit Frobenius norm.
///
/// * `src` - The source 2d points with shape (4, 2).
/// * `dst` - The destination 2d points with shape (4, 2).
///
/// Returns the homography from src to dst with shape (3, 3).
pub fn homography_4pt2d(
    src: &[[f64; 2]; 4],
    dst: &[[f64; 2]; 4],
) -> Result<[[f64; 3]; 3], PnPError> {
    let t_src = normalizing_transform(src)?;
    let t_dst = normalizing_transform(dst)?;
    let src_n = transform_points(&t_src, src);
    let dst_n = transform_points(&t_dst, dst);

    // construct the system A * h = b
    let mut mat_a = SMatrix::<f64, 8, 8>::zeros();
    let mut vec_b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let [x, y] = src_n[i];
        let [u, v] = dst_n[i];
        let r = 2 * i;

        mat_a[(r, 0)] = x;
        mat_a[(r, 1)] = y;
        mat_a[(r, 2)] = 1.0;
        mat_a[(r, 6)] = -u * x;
        mat_a[(r, 7)] = -u * y;
        vec_b[r] = u;

        mat_a[(r + 1, 3)] = x;
        mat_a[(r + 1, 4)] = y;
        mat_a[(r + 1, 5)] = 1.0;
        mat_a[(r + 1, 6)] = -v * x;
        mat_a[(r + 1, 7)] = -v * y;
        vec_b[r + 1] = v;
    }

    let h = mat_a
        .lu()
        .solve(&vec_b)
        .ok_or(PnPError::DegenerateHomography("singular linear system"))?;

    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or(PnPError::DegenerateHomography("non-invertible conditioning"))?;

    let mut homo = t_dst_inv * h_norm * t_src;
    let norm = homo.norm();
    if !norm.is_finite() || norm < f64::EPSILON {
        return Err(PnPError::DegenerateHomography("zero homography"));
    }
    homo /= norm;

    if homo.determinant().abs() < 1e-12 {
        return Err(PnPError::DegenerateHomography("det is too small"));
    }

    Ok([
        [homo[(0, 0)], homo[(0, 1)], homo[(0, 2)]],
        [homo[(1, 0)], homo[(1, 1)], homo[(1, 2)]],
        [homo[(2, 0)], homo[(2, 1)], homo[(2, 2)]],
    ])
}

/// Applies a homography to a 2d point.
pub fn apply_homography(homo: &[[f64; 3]; 3], p: &[f64; 2]) -> Option<[f64; 2]> {
    let w = homo[2][0] * p[0] + homo[2][1] * p[1] + homo[2][2];
    if w.abs() < f64::EPSILON {
        return None;
    }
    Some([
        (homo[0][0] * p[0] + homo[0][1] * p[1] + homo[0][2]) / w,
        (homo[1][0] * p[0] + homo[1][1] * p[1] + homo[1][2]) / w,
    ])
}

fn normalizing_transform(pts: &[[f64; 2]; 4]) -> Result<Matrix3<f64>, PnPError> {
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;

    if !mean_dist.is_finite() || mean_dist < 1e-12 {
        return Err(PnPError::DegenerateHomography("coincident points"));
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    Ok(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn transform_points(t: &Matrix3<f64>, pts: &[[f64; 2]; 4]) -> [[f64; 2]; 4] {
    pts.map(|p| [t[(0, 0)] * p[0] + t[(0, 2)], t[(1, 1)] * p[1] + t[(1, 2)]])
}
