//! Common data types shared by the tag pose solvers.

use crate::camera::CameraIntrinsics;
use thiserror::Error;

/// Error types for pose solvers.
#[derive(Debug, Error)]
pub enum PnPError {
    /// Invalid input data - insufficient correspondences for the specific solver
    #[error("PnP solver requires at least {required} 2D-3D correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of correspondences required by the solver
        required: usize,
        /// Actual number of correspondences provided
        actual: usize,
    },

    /// Invalid input data - mismatched array lengths with descriptive labels.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedArrayLengths {
        /// Label for the left-hand slice
        left_name: &'static str,
        /// Length of the left-hand slice
        left_len: usize,
        /// Label for the right-hand slice
        right_name: &'static str,
        /// Length of the right-hand slice
        right_len: usize,
    },

    /// The camera intrinsics cannot be used for projection.
    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    /// The tag size must be strictly positive.
    #[error("Invalid tag size: {0}")]
    InvalidTagSize(f64),

    /// The corner configuration does not define a homography.
    #[error("Degenerate homography: {0}")]
    DegenerateHomography(&'static str),

    /// The recovered pose is not physically meaningful.
    #[error("Invalid pose: {0}")]
    InvalidPose(&'static str),

    /// Singular value decomposition failed
    #[error("SVD computation failed: {0}")]
    SvdFailed(String),
}

/// Result returned by any pose solver.
///
/// The rotation matrix maps coordinates from the **tag** frame to the
/// **camera** frame. The translation is the tag centre in camera coordinates:
/// `translation[2]` is the forward depth and `translation[0]` the lateral
/// offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PnPResult {
    /// Estimated rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Estimated translation vector.
    pub translation: [f64; 3],
    /// Root-mean-square reprojection error in pixels (if computed).
    pub reproj_rmse: Option<f64>,
}

impl PnPResult {
    /// Packs the pose into a 4x4 rigid transform.
    ///
    /// The rotation occupies the upper-left 3x3 block and the translation the
    /// last column.
    pub fn homogeneous(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Unpacks a 4x4 rigid transform. The bottom row is ignored.
    pub fn from_homogeneous(pose: &[[f64; 4]; 4]) -> Self {
        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for i in 0..3 {
            rotation[i].copy_from_slice(&pose[i][..3]);
            translation[i] = pose[i][3];
        }
        Self {
            rotation,
            translation,
            reproj_rmse: None,
        }
    }
}

/// Trait for single-marker pose solvers.
///
/// Implementations receive the four detected corners in pixels, following the
/// AprilTag ordering (counter-clockwise in the image starting at the
/// bottom-left corner), and the physical side length of the tag.
pub trait PoseSolver {
    /// Solve for the tag pose in the camera frame.
    ///
    /// # Arguments
    /// * `corners` – Detected corner pixels.
    /// * `intrinsics` – Pinhole camera intrinsics.
    /// * `tag_size` – Side length of the tag in world units.
    fn solve(
        &self,
        corners: &[[f64; 2]; 4],
        intrinsics: &CameraIntrinsics,
        tag_size: f64,
    ) -> Result<PnPResult, PnPError>;
}

impl<S: PoseSolver + ?Sized> PoseSolver for Box<S> {
    fn solve(
        &self,
        corners: &[[f64; 2]; 4],
        intrinsics: &CameraIntrinsics,
        tag_size: f64,
    ) -> Result<PnPResult, PnPError> {
        (**self).solve(corners, intrinsics, tag_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homogeneous_layout() {
        let pose = PnPResult {
            rotation: [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.02, -0.01, 0.3],
            reproj_rmse: Some(0.1),
        };
        let m = pose.homogeneous();
        assert_eq!(m[0], [0.0, -1.0, 0.0, 0.02]);
        assert_eq!(m[1], [1.0, 0.0, 0.0, -0.01]);
        assert_eq!(m[2], [0.0, 0.0, 1.0, 0.3]);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);

        let back = PnPResult::from_homogeneous(&m);
        assert_eq!(back.rotation, pose.rotation);
        assert_eq!(back.translation, pose.translation);
        assert_eq!(back.reproj_rmse, None);
    }
}
