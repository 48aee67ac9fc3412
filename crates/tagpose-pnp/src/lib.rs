#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Tagpose PnP
//!
//! Pose of a square fiducial tag in the camera frame, recovered from its four
//! detected image corners and the pinhole intrinsics of the camera.
//!
//! ## Example
//!
//! ```rust
//! use tagpose_pnp::{ops, CameraIntrinsics, PoseSolver, SquareTagSolver};
//!
//! let intrinsics = CameraIntrinsics::new(600.0, 600.0, 240.0, 320.0);
//! let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
//!
//! // project a 15mm tag placed 30cm in front of the camera
//! let object = ops::square_object_points(0.015);
//! let corners = ops::project_points(&object, &identity, &[0.0, 0.0, 0.3], &intrinsics)?;
//!
//! let pose = SquareTagSolver::default().solve(&corners, &intrinsics, 0.015)?;
//! assert!((pose.translation[2] - 0.3).abs() < 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Pinhole camera intrinsics.
pub mod camera;

/// Planar homography estimation.
pub mod homography;

/// Projection and reprojection-error helpers.
pub mod ops;

/// Common data types and the solver trait.
pub mod pnp;

/// Homography-based pose solver for square tags.
pub mod square;

pub use camera::CameraIntrinsics;
pub use pnp::{PnPError, PnPResult, PoseSolver};
pub use square::{SquareTagSolver, SquareTagSolverParams};
