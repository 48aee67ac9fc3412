use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::SensorError,
    frame::{FrameConfig, HeadingCorrection},
};

/// Configuration of the [`AprilTagSensor`](crate::AprilTagSensor).
///
/// Every empirical constant of the pipeline lives here so that a
/// recalibrated robot only needs a new configuration file. Fields missing
/// from a configuration file keep their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Physical side length of every tag, in camera units.
    pub tag_size: f64,
    /// Largest tag id accepted.
    pub max_tag_id: u32,
    /// Largest accepted magnitude of the camera-frame forward depth.
    pub max_depth: f64,
    /// Camera to robot frame conversion.
    pub frame: FrameConfig,
    /// Empirical heading correction.
    pub heading: HeadingCorrection,
    /// Log per-detection diagnostics.
    pub verbose: bool,
    /// Log lifecycle and setup diagnostics.
    pub logging: bool,
    /// Where annotated images are written; disabled when `None`.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            tag_size: 0.015,
            max_tag_id: 10,
            max_depth: 1.0,
            frame: FrameConfig::default(),
            heading: HeadingCorrection::default(),
            verbose: false,
            logging: false,
            diagnostics_dir: None,
        }
    }
}

impl SensorConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SensorError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() -> Result<(), SensorError> {
        let config: SensorConfig =
            serde_json::from_str(r#"{ "max_depth": 2.5, "frame": { "lateral_bias": 0.1 } }"#)?;
        assert_eq!(config.max_depth, 2.5);
        assert_eq!(config.frame.lateral_bias, 0.1);
        assert_eq!(config.frame.scale, 10.0);
        assert_eq!(config.tag_size, 0.015);
        assert_eq!(config.max_tag_id, 10);
        assert_eq!(config.heading, HeadingCorrection::default());
        Ok(())
    }

    #[test]
    fn test_from_json_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sensor.json");
        let config = SensorConfig {
            verbose: true,
            diagnostics_dir: Some(dir.path().join("diag")),
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;

        assert_eq!(SensorConfig::from_json_file(&path)?, config);
        Ok(())
    }
}
