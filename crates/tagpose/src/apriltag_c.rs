//! Live detection through the C AprilTag library.

use ::apriltag::{DetectorBuilder, Family};
use image::GrayImage;

use crate::{
    detection::{Detection, TagDetector},
    error::SensorError,
};

/// [`TagDetector`] backed by the reference AprilTag implementation.
pub struct AprilTagDetector {
    detector: ::apriltag::Detector,
    family: &'static str,
}

impl AprilTagDetector {
    /// Detector for the `tag16h5` family printed on the robot's markers.
    pub fn tag16h5() -> Result<Self, SensorError> {
        let detector = DetectorBuilder::new()
            .add_family_bits(Family::tag_16h5(), 2)
            .build()
            .map_err(|e| SensorError::Detector(format!("{e:?}")))?;

        Ok(Self {
            detector,
            family: "tag16h5",
        })
    }
}

impl TagDetector for AprilTagDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Detection>, SensorError> {
        let (width, height) = (gray.width() as usize, gray.height() as usize);

        let mut img = ::apriltag::Image::zeros_with_stride(width, height, width)
            .into_iter()
            .next()
            .ok_or_else(|| {
                SensorError::Detector(format!("cannot allocate a {width}x{height} apriltag image"))
            })?;

        gray.as_raw()
            .iter()
            .zip(img.as_slice_mut())
            .for_each(|(src, dst)| {
                *dst = *src;
            });

        let detections = self
            .detector
            .detect(&img)
            .into_iter()
            .map(|d| Detection {
                tag_id: d.id() as u32,
                corners: d.corners(),
                center: d.center(),
                hamming: d.hamming() as u32,
                decision_margin: d.decision_margin(),
                tag_family: self.family.to_string(),
            })
            .collect();

        Ok(detections)
    }
}
