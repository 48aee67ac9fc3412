//! The AprilTag sensor pipeline.
//!
//! One call processes one image: the image is converted to grayscale, tags are
//! detected, and every detection is filtered, solved, converted to the robot
//! frame and heading-corrected independently. Problems with a single
//! detection never fail the call; they are logged and reported as a
//! [`Rejection`] in the [`DetectionReport`].

use std::{collections::BTreeMap, path::Path};

use image::{DynamicImage, RgbImage};
use log::{debug, info, warn};
use tagpose_pnp::{CameraIntrinsics, PoseSolver, SquareTagSolver};

use crate::{
    annotate::write_diagnostic,
    calibration::{CalibrationBundle, Calibrator},
    config::SensorConfig,
    detection::{Detection, TagDetector},
    error::SensorError,
    frame::{yaw_from_rotation, RobotMeasurement},
};

/// Measurements keyed by the decimal tag id.
pub type Measurements = BTreeMap<String, RobotMeasurement>;

/// Why a detection produced no measurement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// The tag id is above the accepted range.
    #[error("invalid apriltag id, accepted ids are 0..={max}")]
    InvalidTagId {
        /// Largest accepted id.
        max: u32,
    },

    /// The camera-frame depth is outside the working range.
    #[error("measurement outside of working range: depth {depth} exceeds {max}")]
    OutOfRange {
        /// Forward depth reported by the solver.
        depth: f64,
        /// Working range bound.
        max: f64,
    },

    /// The forward distance cannot feed the logarithmic heading correction.
    #[error("forward distance {x} is not positive, heading correction undefined")]
    NonPositiveRange {
        /// Forward distance in robot units.
        x: f64,
    },

    /// The pose solver could not produce a pose.
    #[error("pose solver failed: {0}")]
    SolverFailed(String),
}

/// Result of processing one detection.
#[derive(Debug, Clone, PartialEq)]
pub enum TagStatus {
    /// A measurement was produced.
    Resolved(RobotMeasurement),
    /// The detection was skipped.
    Rejected(Rejection),
}

/// Outcome of one detection, in detector order.
#[derive(Debug, Clone, PartialEq)]
pub struct TagOutcome {
    /// Tag identifier.
    pub tag_id: u32,
    /// Bits corrected by the detector.
    pub hamming: u32,
    /// Detector confidence margin.
    pub decision_margin: f32,
    /// What happened to the detection.
    pub status: TagStatus,
}

/// Everything produced for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    /// Number of tags reported by the detector.
    pub detections: usize,
    /// Per detection outcomes, in detector order.
    pub outcomes: Vec<TagOutcome>,
    /// Resolved measurements. A tag id seen twice keeps the later detection.
    pub measurements: Measurements,
}

impl DetectionReport {
    /// Iterates over the rejected detections.
    pub fn rejections(&self) -> impl Iterator<Item = (u32, &Rejection)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            TagStatus::Rejected(r) => Some((o.tag_id, r)),
            TagStatus::Resolved(_) => None,
        })
    }
}

/// Estimates the robot-relative pose of AprilTags seen by the onboard camera.
pub struct AprilTagSensor<D, S = SquareTagSolver> {
    calibration: CalibrationBundle,
    detector: D,
    solver: S,
    config: SensorConfig,
}

impl<D: TagDetector> AprilTagSensor<D, SquareTagSolver> {
    /// Creates a sensor from the calibration stored in `calibration_dir`.
    ///
    /// When the directory holds no calibration artifact yet, `calibrator` is
    /// asked to produce it first.
    ///
    /// # Arguments
    ///
    /// * `calibration_dir` - Directory holding `default.xml`.
    /// * `calibrator` - Produces the artifact when it is missing.
    /// * `detector` - The fiducial detector.
    /// * `config` - Pipeline configuration.
    pub fn new(
        calibration_dir: impl AsRef<Path>,
        calibrator: &dyn Calibrator,
        detector: D,
        config: SensorConfig,
    ) -> Result<Self, SensorError> {
        let calibration_dir = calibration_dir.as_ref();
        if config.logging {
            info!("loading calibration from {}", calibration_dir.display());
        }
        let calibration = CalibrationBundle::load_or_calibrate(calibration_dir, calibrator)?;
        Ok(Self::from_bundle(
            calibration,
            detector,
            SquareTagSolver::default(),
            config,
        ))
    }
}

impl<D: TagDetector, S: PoseSolver> AprilTagSensor<D, S> {
    /// Creates a sensor from an already loaded calibration and a pose solver.
    pub fn from_bundle(
        calibration: CalibrationBundle,
        detector: D,
        solver: S,
        config: SensorConfig,
    ) -> Self {
        if config.logging {
            info!(
                "AprilTag sensor setup complete: fx {} fy {} frame {}x{}",
                calibration.fx(),
                calibration.fy(),
                calibration.frame_size.0,
                calibration.frame_size.1
            );
        }
        Self {
            calibration,
            detector,
            solver,
            config,
        }
    }

    /// The calibration in use.
    #[inline]
    pub fn calibration(&self) -> &CalibrationBundle {
        &self.calibration
    }

    /// The sensor configuration.
    #[inline]
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Processes the image at `image_path`.
    ///
    /// Fails only if the image cannot be read or decoded, or the detector
    /// cannot search it.
    pub fn detect(&mut self, image_path: impl AsRef<Path>) -> Result<DetectionReport, SensorError> {
        let image = image::open(image_path.as_ref())?;
        self.detect_image(&image)
    }

    /// Processes the image at `image_path` and stores the resolved tags in
    /// `measurements`, replacing earlier entries of the same ids.
    ///
    /// Returns `Ok(true)` whenever the image could be processed, whether or not
    /// any tag was resolved.
    pub fn detect_into(
        &mut self,
        image_path: impl AsRef<Path>,
        measurements: &mut Measurements,
    ) -> Result<bool, SensorError> {
        let report = self.detect(image_path)?;
        measurements.extend(report.measurements);
        Ok(true)
    }

    /// Processes an already decoded image.
    pub fn detect_image(&mut self, image: &DynamicImage) -> Result<DetectionReport, SensorError> {
        let gray = image.to_luma8();
        let detections = self.detector.detect(&gray)?;

        let rgb = self
            .config
            .diagnostics_dir
            .as_ref()
            .map(|_| image.to_rgb8());

        Ok(self.process_detections(&detections, gray.width(), gray.height(), rgb.as_ref()))
    }

    /// Turns detections of a `width` x `height` frame into measurements.
    ///
    /// `image` is only used for the diagnostic images.
    pub fn process_detections(
        &self,
        detections: &[Detection],
        width: u32,
        height: u32,
        image: Option<&RgbImage>,
    ) -> DetectionReport {
        let verbose = self.config.verbose;
        let camera = self.calibration.camera_frame_params(width, height);

        if verbose {
            info!("found {} detections", detections.len());
        }

        let mut report = DetectionReport {
            detections: detections.len(),
            ..Default::default()
        };

        for (i, detection) in detections.iter().enumerate() {
            if verbose {
                debug!(
                    "detection {i}: id {} hamming {} margin {}",
                    detection.tag_id, detection.hamming, detection.decision_margin
                );
            }

            let status = match self.resolve(detection, &camera) {
                Ok(measurement) => {
                    report
                        .measurements
                        .insert(detection.tag_id.to_string(), measurement);

                    if let (Some(dir), Some(rgb)) = (&self.config.diagnostics_dir, image) {
                        if let Err(e) = write_diagnostic(dir, rgb, detection, &measurement) {
                            warn!(
                                "cannot write diagnostic image for tag {}: {e}",
                                detection.tag_id
                            );
                        }
                    }

                    TagStatus::Resolved(measurement)
                }
                Err(rejection) => {
                    warn!("skipping tag {}: {rejection}", detection.tag_id);
                    TagStatus::Rejected(rejection)
                }
            };

            report.outcomes.push(TagOutcome {
                tag_id: detection.tag_id,
                hamming: detection.hamming,
                decision_margin: detection.decision_margin,
                status,
            });
        }

        report
    }

    /// Robot-frame measurement of a single detection.
    pub fn resolve(
        &self,
        detection: &Detection,
        camera: &CameraIntrinsics,
    ) -> Result<RobotMeasurement, Rejection> {
        let config = &self.config;

        if detection.tag_id > config.max_tag_id {
            return Err(Rejection::InvalidTagId {
                max: config.max_tag_id,
            });
        }

        let pose = self
            .solver
            .solve(&detection.corners, camera, config.tag_size)
            .map_err(|e| Rejection::SolverFailed(e.to_string()))?;
        let t = pose.translation;

        if t[2].abs() > config.max_depth {
            return Err(Rejection::OutOfRange {
                depth: t[2],
                max: config.max_depth,
            });
        }

        let (x, y) = config.frame.to_robot_xy(&t);
        let raw_yaw = yaw_from_rotation(&pose.rotation);
        let yaw = config
            .heading
            .apply(raw_yaw, x)
            .ok_or(Rejection::NonPositiveRange { x })?;

        if config.verbose {
            debug!(
                "tag {}: t {:?} raw yaw {raw_yaw:.4} -> x {x:.4} y {y:.4} yaw {yaw:.4}",
                detection.tag_id, t
            );
        }

        Ok(RobotMeasurement { x, y, yaw })
    }
}
