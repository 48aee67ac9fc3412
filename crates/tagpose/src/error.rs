use std::path::PathBuf;

/// Errors raised while loading or producing the calibration artifact.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// The artifact does not exist and no calibrator could produce it.
    #[error("Calibration artifact not found: {0}")]
    Missing(PathBuf),

    /// The external calibration routine failed.
    #[error("Calibration failed: {0}")]
    CalibratorFailed(String),

    /// Error to read or write the artifact.
    #[error("Failed to manipulate the calibration file. {0}")]
    Io(#[from] std::io::Error),

    /// The artifact is not well-formed XML.
    #[error("Failed to parse the calibration xml. {0}")]
    Xml(#[from] roxmltree::Error),

    /// A required element is absent.
    #[error("Missing calibration element: {0}")]
    MissingElement(&'static str),

    /// An element holds a token that is not a number.
    #[error("Invalid value in {element}: {value}")]
    InvalidValue {
        /// Name of the offending element.
        element: &'static str,
        /// The token that failed to parse.
        value: String,
    },

    /// An element holds the wrong number of values.
    #[error("{element} expects {expected} values, got {actual}")]
    WrongLength {
        /// Name of the offending element.
        element: &'static str,
        /// Number of values required.
        expected: usize,
        /// Number of values found.
        actual: usize,
    },
}

/// An error type for the sensor pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The sensor could not be initialized from its calibration.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// The input image could not be read or decoded.
    #[error("Failed to load the image. {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem error.
    #[error("Failed to manipulate the file. {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or detection replay file could not be parsed.
    #[error("Failed to parse json. {0}")]
    Json(#[from] serde_json::Error),

    /// The tag detector could not be created.
    #[error("Failed to create the tag detector: {0}")]
    Detector(String),
}
