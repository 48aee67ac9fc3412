//! Pinhole camera intrinsics used by the pose solvers.

use crate::pnp::PnPError;

/// Represents the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x direction
    pub fx: f64,
    /// Focal length in y direction
    pub fy: f64,
    /// Principal point x coordinate
    pub cx: f64,
    /// Principal point y coordinate
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Create camera intrinsics from focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Create camera intrinsics from a 3x3 intrinsics matrix.
    pub fn from_matrix(k: &[[f64; 3]; 3]) -> Result<Self, PnPError> {
        if k[0][1] != 0.0 || k[1][0] != 0.0 || k[2][0] != 0.0 || k[2][1] != 0.0 || k[2][2] != 1.0
        {
            return Err(PnPError::InvalidIntrinsics(
                "Intrinsics matrix must have form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]"
                    .to_string(),
            ));
        }

        let intrinsics = Self {
            fx: k[0][0],
            fy: k[1][1],
            cx: k[0][2],
            cy: k[1][2],
        };
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    /// Convert to 3x3 intrinsics matrix.
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Checks that both focal lengths are finite and strictly positive.
    pub fn validate(&self) -> Result<(), PnPError> {
        let finite = [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(PnPError::InvalidIntrinsics(format!(
                "expected finite positive focal lengths, got fx={} fy={}",
                self.fx, self.fy
            )));
        }
        Ok(())
    }

    /// Maps a pixel to normalized image coordinates (`K^-1 * [u, v, 1]`).
    #[inline]
    pub fn normalize(&self, pixel: &[f64; 2]) -> [f64; 2] {
        [
            (pixel[0] - self.cx) / self.fx,
            (pixel[1] - self.cy) / self.fy,
        ]
    }

    /// Projects a point in camera coordinates to pixels.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[inline]
    pub fn project(&self, point: &[f64; 3]) -> Option<[f64; 2]> {
        if point[2] <= f64::EPSILON {
            return None;
        }
        let inv_z = 1.0 / point[2];
        Some([
            self.fx * point[0] * inv_z + self.cx,
            self.fy * point[1] * inv_z + self.cy,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_matrix() -> Result<(), PnPError> {
        let k = [[600.0, 0.0, 320.0], [0.0, 610.0, 240.0], [0.0, 0.0, 1.0]];
        let intrinsics = CameraIntrinsics::from_matrix(&k)?;
        assert_eq!(intrinsics, CameraIntrinsics::new(600.0, 610.0, 320.0, 240.0));
        assert_eq!(intrinsics.to_matrix(), k);
        Ok(())
    }

    #[test]
    fn test_from_matrix_rejects_skew_and_zero_focal() {
        let skewed = [[600.0, 1.0, 320.0], [0.0, 600.0, 240.0], [0.0, 0.0, 1.0]];
        assert!(CameraIntrinsics::from_matrix(&skewed).is_err());

        let zero = [[0.0, 0.0, 320.0], [0.0, 600.0, 240.0], [0.0, 0.0, 1.0]];
        assert!(CameraIntrinsics::from_matrix(&zero).is_err());
    }

    #[test]
    fn test_normalize_inverts_project() {
        let intrinsics = CameraIntrinsics::new(500.0, 520.0, 300.0, 200.0);
        let point = [0.1, -0.05, 2.0];
        let pixel = intrinsics.project(&point).unwrap();
        let norm = intrinsics.normalize(&pixel);
        assert_relative_eq!(norm[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(norm[1], -0.025, epsilon = 1e-12);
    }

    #[test]
    fn test_project_behind_camera() {
        let intrinsics = CameraIntrinsics::new(500.0, 500.0, 0.0, 0.0);
        assert!(intrinsics.project(&[0.0, 0.0, -1.0]).is_none());
        assert!(intrinsics.project(&[0.0, 0.0, 0.0]).is_none());
    }
}
