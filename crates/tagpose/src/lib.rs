#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Tagpose
//!
//! Turns AprilTag detections from a single camera frame into `(x, y, yaw)`
//! measurements in the robot frame, one per tag.
//!
//! ```rust
//! use image::{DynamicImage, GrayImage};
//! use tagpose::{
//!     AprilTagSensor, CalibrationBundle, Detection, ReplayDetector, SensorConfig,
//! };
//! use tagpose_pnp::{ops, SquareTagSolver};
//!
//! let calibration = CalibrationBundle {
//!     camera_matrix: [[600.0, 0.0, 320.0], [0.0, 600.0, 240.0], [0.0, 0.0, 1.0]],
//!     dist_coeffs: vec![],
//!     rvecs: vec![],
//!     tvecs: vec![],
//!     frame_size: (640, 480),
//! };
//!
//! // a tag 30cm straight ahead of a 640x480 camera
//! let camera = calibration.camera_frame_params(640, 480);
//! let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
//! let corners = ops::project_points(
//!     &ops::square_object_points(0.015), &identity, &[0.0, 0.0, 0.3], &camera,
//! )?;
//! let detection = Detection {
//!     tag_id: 3,
//!     corners,
//!     center: [camera.cx, camera.cy],
//!     hamming: 0,
//!     decision_margin: 50.0,
//!     tag_family: "tag16h5".to_string(),
//! };
//!
//! let mut sensor = AprilTagSensor::from_bundle(
//!     calibration,
//!     ReplayDetector::new(vec![detection]),
//!     SquareTagSolver::default(),
//!     SensorConfig::default(),
//! );
//! let report = sensor.detect_image(&DynamicImage::ImageLuma8(GrayImage::new(640, 480)))?;
//!
//! let m = report.measurements["3"];
//! assert!((m.x - 3.0).abs() < 1e-6);
//! assert!((m.y - 0.094).abs() < 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Annotated diagnostic images.
pub mod annotate;

/// Live detection with the C AprilTag library.
#[cfg(feature = "apriltag")]
pub mod apriltag_c;

/// Camera calibration bundle.
pub mod calibration;

/// Sensor configuration.
pub mod config;

/// Tag detections and detectors.
pub mod detection;

/// Error types.
pub mod error;

/// Robot frame conversion and heading correction.
pub mod frame;

/// The detection pipeline.
pub mod sensor;

#[cfg(feature = "apriltag")]
pub use apriltag_c::AprilTagDetector;
pub use calibration::{CalibrationBundle, Calibrator, NoCalibrator};
pub use config::SensorConfig;
pub use detection::{Detection, ReplayDetector, TagDetector};
pub use error::{CalibrationError, SensorError};
pub use frame::{FrameConfig, HeadingCorrection, RobotMeasurement};
pub use sensor::{
    AprilTagSensor, DetectionReport, Measurements, Rejection, TagOutcome, TagStatus,
};
