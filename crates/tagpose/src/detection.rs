//! Tag detections and the detector seam.

use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::SensorError;

/// One fiducial tag observed in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Decoded tag identifier.
    pub tag_id: u32,
    /// Corner pixels, counter-clockwise in the image starting bottom-left.
    pub corners: [[f64; 2]; 4],
    /// Centre pixel of the tag.
    pub center: [f64; 2],
    /// Number of bits corrected while decoding.
    pub hamming: u32,
    /// Decoding confidence margin.
    pub decision_margin: f32,
    /// Name of the tag family, e.g. `tag16h5`.
    pub tag_family: String,
}

/// A fiducial detector operating on grayscale images.
///
/// Detections are returned in detector order. An error means the image could
/// not be searched at all, not that no tag was found.
pub trait TagDetector {
    /// Detects all tags in `gray`.
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Detection>, SensorError>;
}

impl<D: TagDetector + ?Sized> TagDetector for Box<D> {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<Detection>, SensorError> {
        (**self).detect(gray)
    }
}

/// Returns a fixed list of detections for every image.
///
/// Used to replay detections recorded on the robot and to drive the pipeline
/// without the C detector.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    detections: Vec<Detection>,
}

impl ReplayDetector {
    /// Creates a detector that always reports `detections`.
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Loads recorded detections from a JSON array.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SensorError> {
        let file = std::fs::File::open(path)?;
        let detections = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self::new(detections))
    }

    /// The detections reported for every image.
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }
}

impl TagDetector for ReplayDetector {
    fn detect(&mut self, _gray: &GrayImage) -> Result<Vec<Detection>, SensorError> {
        Ok(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(tag_id: u32) -> Detection {
        Detection {
            tag_id,
            corners: [[10.0, 20.0], [20.0, 20.0], [20.0, 10.0], [10.0, 10.0]],
            center: [15.0, 15.0],
            hamming: 0,
            decision_margin: 42.5,
            tag_family: "tag16h5".to_string(),
        }
    }

    #[test]
    fn test_replay_detector() -> Result<(), SensorError> {
        let mut detector = ReplayDetector::new(vec![detection(3), detection(7)]);
        let gray = GrayImage::new(8, 8);
        let first = detector.detect(&gray)?;
        let second = detector.detect(&gray)?;
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|d| d.tag_id).collect::<Vec<_>>(), vec![3, 7]);
        Ok(())
    }

    #[test]
    fn test_replay_detector_from_json() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("detections.json");
        std::fs::write(&path, serde_json::to_string(&vec![detection(4)])?)?;

        let detector = ReplayDetector::from_json_file(&path)?;
        assert_eq!(detector.detections(), &[detection(4)]);
        Ok(())
    }
}
