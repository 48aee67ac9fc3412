use nalgebra::{Rotation3, Vector3};

use crate::{camera::CameraIntrinsics, pnp::PnPError};

/// Generate the 3D object points of a square tag of side `tag_size` on the z=0 plane.
///
/// The order follows the AprilTag corner convention, counter-clockwise in the
/// image starting at the bottom-left corner:
///  - p0 = [-s/2,  s/2, 0]
///  - p1 = [ s/2,  s/2, 0]
///  - p2 = [ s/2, -s/2, 0]
///  - p3 = [-s/2, -s/2, 0]
pub fn square_object_points(tag_size: f64) -> [[f64; 3]; 4] {
    let h = tag_size / 2.0;
    [[-h, h, 0.0], [h, h, 0.0], [h, -h, 0.0], [-h, -h, 0.0]]
}

/// Apply the rigid transform `R * p + t`.
#[inline]
pub fn transform_point(r: &[[f64; 3]; 3], t: &[f64; 3], p: &[f64; 3]) -> [f64; 3] {
    [
        r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + t[0],
        r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + t[1],
        r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + t[2],
    ]
}

/// Project object points through the pose `(r, t)` and the pinhole intrinsics.
pub fn project_points<const N: usize>(
    points: &[[f64; 3]; N],
    r: &[[f64; 3]; 3],
    t: &[f64; 3],
    intrinsics: &CameraIntrinsics,
) -> Result<[[f64; 2]; N], PnPError> {
    let mut pixels = [[0.0; 2]; N];
    for (px, p) in pixels.iter_mut().zip(points.iter()) {
        *px = intrinsics
            .project(&transform_point(r, t, p))
            .ok_or(PnPError::InvalidPose("point projects behind the camera"))?;
    }
    Ok(pixels)
}

/// Root-mean-square pixel reprojection error of a pose.
pub fn reprojection_rmse(
    object: &[[f64; 3]],
    image: &[[f64; 2]],
    r: &[[f64; 3]; 3],
    t: &[f64; 3],
    intrinsics: &CameraIntrinsics,
) -> Result<f64, PnPError> {
    if object.len() != image.len() {
        return Err(PnPError::MismatchedArrayLengths {
            left_name: "object",
            left_len: object.len(),
            right_name: "image",
            right_len: image.len(),
        });
    }
    if object.is_empty() {
        return Err(PnPError::InsufficientCorrespondences {
            required: 1,
            actual: 0,
        });
    }

    let mut sum_sq = 0.0;
    for (pw, uv) in object.iter().zip(image.iter()) {
        let [u, v] = intrinsics
            .project(&transform_point(r, t, pw))
            .ok_or(PnPError::InvalidPose("projection has non-positive depth"))?;
        let du = u - uv[0];
        let dv = v - uv[1];
        sum_sq += du.mul_add(du, dv * dv);
    }
    Ok((sum_sq / object.len() as f64).sqrt())
}

/// Rotation matrix of the axis-angle vector `w` (Rodrigues formula).
pub fn rotation_from_axis_angle(w: &[f64; 3]) -> [[f64; 3]; 3] {
    let m = Rotation3::new(Vector3::new(w[0], w[1], w[2])).into_inner();
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    #[test]
    fn test_square_object_points_winding() {
        let pts = square_object_points(2.0);
        assert_eq!(pts[0], [-1.0, 1.0, 0.0]);
        assert_eq!(pts[2], [1.0, -1.0, 0.0]);
        // counter-clockwise in the image (y down) means clockwise in x/y-up
        let area: f64 = (0..4)
            .map(|i| {
                let (a, b) = (pts[i], pts[(i + 1) % 4]);
                a[0] * b[1] - b[0] * a[1]
            })
            .sum();
        assert_relative_eq!(area, -8.0);
    }

    #[test]
    fn test_project_points_fronto_parallel() -> Result<(), PnPError> {
        let intr = CameraIntrinsics::new(600.0, 600.0, 240.0, 320.0);
        let px = project_points(&square_object_points(0.015), &IDENTITY, &[0.0, 0.0, 0.3], &intr)?;
        // 600 * 0.0075 / 0.3 = 15 pixels from the principal point
        assert_relative_eq!(px[0][0], 225.0, epsilon = 1e-9);
        assert_relative_eq!(px[0][1], 335.0, epsilon = 1e-9);
        assert_relative_eq!(px[2][0], 255.0, epsilon = 1e-9);
        assert_relative_eq!(px[2][1], 305.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_project_points_behind_camera() {
        let intr = CameraIntrinsics::new(600.0, 600.0, 240.0, 320.0);
        let res = project_points(&square_object_points(0.015), &IDENTITY, &[0.0, 0.0, -0.3], &intr);
        assert!(matches!(res, Err(PnPError::InvalidPose(_))));
    }

    #[test]
    fn test_reprojection_rmse() -> Result<(), PnPError> {
        let intr = CameraIntrinsics::new(600.0, 600.0, 240.0, 320.0);
        let obj = square_object_points(0.015);
        let t = [0.01, 0.0, 0.5];
        let mut px = project_points(&obj, &IDENTITY, &t, &intr)?;
        assert_relative_eq!(reprojection_rmse(&obj, &px, &IDENTITY, &t, &intr)?, 0.0);

        // shift every observation by (3, 4) pixels -> rmse of 5
        for p in px.iter_mut() {
            p[0] += 3.0;
            p[1] += 4.0;
        }
        assert_relative_eq!(
            reprojection_rmse(&obj, &px, &IDENTITY, &t, &intr)?,
            5.0,
            epsilon = 1e-9
        );

        assert!(reprojection_rmse(&obj, &px[..3], &IDENTITY, &t, &intr).is_err());
        Ok(())
    }

    #[test]
    fn test_rotation_from_axis_angle() {
        let r = rotation_from_axis_angle(&[0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        assert_relative_eq!(r[0][0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[0][1], -1.0, epsilon = 1e-12);
        assert_relative_eq!(r[1][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(r[2][2], 1.0, epsilon = 1e-12);
    }
}
