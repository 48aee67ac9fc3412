//! Homography-based pose estimation for a single square tag.
//!
//! The four corners are lifted to normalized image coordinates, a planar
//! homography from the tag plane is estimated and decomposed into `[r1 r2 t]`,
//! and the rotation is projected back onto SO(3). The pose is then optionally
//! polished with a few Gauss-Newton steps on the pixel reprojection error.

use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3, Vector6};

use crate::{
    camera::CameraIntrinsics,
    homography::homography_4pt2d,
    ops::{reprojection_rmse, square_object_points},
    pnp::{PnPError, PnPResult, PoseSolver},
};

/// Parameters controlling the [`SquareTagSolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct SquareTagSolverParams {
    /// Whether to refine the homography pose with Gauss-Newton.
    pub refine: bool,
    /// Maximum number of Gauss-Newton iterations.
    pub max_iterations: usize,
    /// Stop once the update norm drops below this value.
    pub tolerance: f64,
}

impl Default for SquareTagSolverParams {
    fn default() -> Self {
        Self {
            refine: true,
            max_iterations: 10,
            tolerance: 1e-10,
        }
    }
}

/// Pose solver for square planar tags.
#[derive(Debug, Clone, Default)]
pub struct SquareTagSolver {
    /// Solver parameters.
    pub params: SquareTagSolverParams,
}

impl SquareTagSolver {
    /// Creates a solver with the given parameters.
    pub fn new(params: SquareTagSolverParams) -> Self {
        Self { params }
    }
}

impl PoseSolver for SquareTagSolver {
    fn solve(
        &self,
        corners: &[[f64; 2]; 4],
        intrinsics: &CameraIntrinsics,
        tag_size: f64,
    ) -> Result<PnPResult, PnPError> {
        intrinsics.validate()?;
        if !tag_size.is_finite() || tag_size <= 0.0 {
            return Err(PnPError::InvalidTagSize(tag_size));
        }

        let object = square_object_points(tag_size);
        let src = object.map(|p| [p[0], p[1]]);
        let dst = corners.map(|c| intrinsics.normalize(&c));

        let homo = homography_4pt2d(&src, &dst)?;
        let (mut rotation, mut translation) = decompose_homography(&homo)?;

        if self.params.refine {
            (rotation, translation) = refine_pose(
                &object,
                corners,
                &rotation,
                &translation,
                intrinsics,
                &self.params,
            );
        }

        let rmse = reprojection_rmse(&object, corners, &rotation, &translation, intrinsics)?;

        Ok(PnPResult {
            rotation,
            translation,
            reproj_rmse: Some(rmse),
        })
    }
}

/// Decompose a tag-plane to normalized-image homography into a rigid pose.
///
/// The scale is chosen so that `||r1|| * ||r2|| = 1` and its sign so that the
/// tag lies in front of the camera.
fn decompose_homography(h: &[[f64; 3]; 3]) -> Result<([[f64; 3]; 3], [f64; 3]), PnPError> {
    let h1 = Vector3::new(h[0][0], h[1][0], h[2][0]);
    let h2 = Vector3::new(h[0][1], h[1][1], h[2][1]);
    let h3 = Vector3::new(h[0][2], h[1][2], h[2][2]);

    let n12 = h1.norm() * h2.norm();
    if n12 < f64::EPSILON {
        return Err(PnPError::DegenerateHomography("vanishing rotation columns"));
    }

    let mut s = 1.0 / n12.sqrt();
    if h3.z * s < 0.0 {
        s = -s;
    }

    let r1 = h1 * s;
    let r2 = h2 * s;
    let r3 = r1.cross(&r2);
    let t = h3 * s;

    if t.z <= 0.0 {
        return Err(PnPError::InvalidPose("tag plane passes through the camera centre"));
    }

    // project onto SO(3)
    let svd = Matrix3::from_columns(&[r1, r2, r3]).svd(true, true);
    let mut u = svd
        .u
        .ok_or_else(|| PnPError::SvdFailed("missing left singular vectors".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| PnPError::SvdFailed("missing right singular vectors".to_string()))?;

    let mut rot = u * v_t;
    if rot.determinant() < 0.0 {
        let flipped = -u.column(2);
        u.set_column(2, &flipped);
        rot = u * v_t;
    }

    Ok((mat3_to_array(&rot), [t.x, t.y, t.z]))
}

/// Gauss-Newton refinement of `(R, t)` on the squared pixel reprojection error.
///
/// Rotation updates are applied on the left, `R <- exp(dw) * R`. Steps that do
/// not decrease the cost are discarded and end the iteration.
fn refine_pose(
    object: &[[f64; 3]; 4],
    corners: &[[f64; 2]; 4],
    r0: &[[f64; 3]; 3],
    t0: &[f64; 3],
    intr: &CameraIntrinsics,
    params: &SquareTagSolverParams,
) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut rot = Matrix3::from_fn(|i, j| r0[i][j]);
    let mut t = Vector3::new(t0[0], t0[1], t0[2]);

    let Some(mut cost) = squared_error(object, corners, &rot, &t, intr) else {
        return (*r0, *t0);
    };

    for _ in 0..params.max_iterations {
        let mut jtj = Matrix6::<f64>::zeros();
        let mut jtr = Vector6::<f64>::zeros();

        for (p, uv) in object.iter().zip(corners.iter()) {
            let rp = rot * Vector3::new(p[0], p[1], p[2]);
            let pc = rp + t;
            if pc.z <= f64::EPSILON {
                return (mat3_to_array(&rot), [t.x, t.y, t.z]);
            }
            let iz = 1.0 / pc.z;
            let ru = intr.fx * pc.x * iz + intr.cx - uv[0];
            let rv = intr.fy * pc.y * iz + intr.cy - uv[1];

            let du = Vector3::new(intr.fx * iz, 0.0, -intr.fx * pc.x * iz * iz);
            let dv = Vector3::new(0.0, intr.fy * iz, -intr.fy * pc.y * iz * iz);

            for (d, res) in [(du, ru), (dv, rv)] {
                let w = rp.cross(&d);
                let j = Vector6::new(w.x, w.y, w.z, d.x, d.y, d.z);
                jtj += j * j.transpose();
                jtr += j * res;
            }
        }

        let Some(chol) = jtj.cholesky() else {
            break;
        };
        let delta = -chol.solve(&jtr);

        let dw = Vector3::new(delta[0], delta[1], delta[2]);
        let rot_new = Rotation3::new(dw).into_inner() * rot;
        let t_new = t + Vector3::new(delta[3], delta[4], delta[5]);

        match squared_error(object, corners, &rot_new, &t_new, intr) {
            Some(new_cost) if new_cost < cost => {
                rot = rot_new;
                t = t_new;
                cost = new_cost;
            }
            _ => break,
        }

        if delta.norm() < params.tolerance {
            break;
        }
    }

    (mat3_to_array(&rot), [t.x, t.y, t.z])
}

fn squared_error(
    object: &[[f64; 3]; 4],
    corners: &[[f64; 2]; 4],
    rot: &Matrix3<f64>,
    t: &Vector3<f64>,
    intr: &CameraIntrinsics,
) -> Option<f64> {
    let mut sum = 0.0;
    for (p, uv) in object.iter().zip(corners.iter()) {
        let pc = rot * Vector3::new(p[0], p[1], p[2]) + t;
        let [u, v] = intr.project(&[pc.x, pc.y, pc.z])?;
        sum += (u - uv[0]).powi(2) + (v - uv[1]).powi(2);
    }
    Some(sum)
}

fn mat3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}
