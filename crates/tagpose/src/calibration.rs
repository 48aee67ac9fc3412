//! Camera calibration bundle and its XML artifact.
//!
//! The artifact lives at `<calibration dir>/default.xml` and looks like
//!
//! ```xml
//! <opencv_storage>
//!   <CameraMatrix>fx 0 cx 0 fy cy 0 0 1</CameraMatrix>
//!   <DistCoeffs>k1 k2 p1 p2 k3</DistCoeffs>
//!   <Rvecs><Rvec>rx ry rz</Rvec></Rvecs>
//!   <Tvecs><Tvec>tx ty tz</Tvec></Tvecs>
//!   <FrameSize>width height</FrameSize>
//! </opencv_storage>
//! ```

use std::path::{Path, PathBuf};

use roxmltree::Node;
use tagpose_pnp::CameraIntrinsics;

use crate::error::CalibrationError;

/// File name of the calibration artifact inside the calibration directory.
pub const CALIBRATION_FILE_NAME: &str = "default.xml";

/// Intrinsic and extrinsic calibration of the onboard camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBundle {
    /// Row-major 3x3 camera matrix.
    pub camera_matrix: [[f64; 3]; 3],
    /// Lens distortion coefficients.
    pub dist_coeffs: Vec<f64>,
    /// Per calibration image rotation vectors.
    pub rvecs: Vec<[f64; 3]>,
    /// Per calibration image translation vectors.
    pub tvecs: Vec<[f64; 3]>,
    /// Width and height of the calibration frames.
    pub frame_size: (u32, u32),
}

/// Produces the calibration artifact when it does not exist yet.
pub trait Calibrator {
    /// Runs the calibration and writes [`CALIBRATION_FILE_NAME`] into `dir`.
    fn calibrate(&self, dir: &Path) -> Result<(), CalibrationError>;
}

/// A [`Calibrator`] for deployments that ship a pre-computed artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalibrator;

impl Calibrator for NoCalibrator {
    fn calibrate(&self, dir: &Path) -> Result<(), CalibrationError> {
        Err(CalibrationError::Missing(dir.join(CALIBRATION_FILE_NAME)))
    }
}

impl CalibrationBundle {
    /// Location of the artifact inside a calibration directory.
    pub fn artifact_path(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(CALIBRATION_FILE_NAME)
    }

    /// Loads the artifact from `dir`, running `calibrator` first if it is missing.
    pub fn load_or_calibrate(
        dir: impl AsRef<Path>,
        calibrator: &dyn Calibrator,
    ) -> Result<Self, CalibrationError> {
        let dir = dir.as_ref();
        let path = Self::artifact_path(dir);

        if !path.exists() {
            calibrator.calibrate(dir)?;
            if !path.exists() {
                return Err(CalibrationError::Missing(path));
            }
        }

        Self::from_file(&path)
    }

    /// Reads and parses an artifact file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_xml_str(&text)
    }

    /// Parses the XML artifact. The root element name is not checked.
    pub fn from_xml_str(text: &str) -> Result<Self, CalibrationError> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();

        let k = parse_floats(child(root, "CameraMatrix")?, "CameraMatrix")?;
        if k.len() != 9 {
            return Err(CalibrationError::WrongLength {
                element: "CameraMatrix",
                expected: 9,
                actual: k.len(),
            });
        }
        let camera_matrix = [[k[0], k[1], k[2]], [k[3], k[4], k[5]], [k[6], k[7], k[8]]];

        let dist_coeffs = parse_floats(child(root, "DistCoeffs")?, "DistCoeffs")?;
        let rvecs = parse_vec3_list(child(root, "Rvecs")?, "Rvecs")?;
        let tvecs = parse_vec3_list(child(root, "Tvecs")?, "Tvecs")?;

        let frame = child(root, "FrameSize")?
            .text()
            .unwrap_or_default()
            .split_whitespace()
            .map(|tok| {
                tok.parse::<u32>().map_err(|_| CalibrationError::InvalidValue {
                    element: "FrameSize",
                    value: tok.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let frame_size = match frame[..] {
            [w, h] => (w, h),
            _ => {
                return Err(CalibrationError::WrongLength {
                    element: "FrameSize",
                    expected: 2,
                    actual: frame.len(),
                })
            }
        };

        Ok(Self {
            camera_matrix,
            dist_coeffs,
            rvecs,
            tvecs,
            frame_size,
        })
    }

    /// Serializes the bundle in the artifact format read by [`Self::from_xml_str`].
    pub fn to_xml_string(&self) -> String {
        let k = &self.camera_matrix;
        let vec3_list = |tag: &str, vs: &[[f64; 3]]| {
            vs.iter()
                .map(|v| format!("    <{tag}>{}</{tag}>\n", join(v)))
                .collect::<String>()
        };

        format!(
            "<?xml version=\"1.0\"?>\n<opencv_storage>\n  <CameraMatrix>{}</CameraMatrix>\n  <DistCoeffs>{}</DistCoeffs>\n  <Rvecs>\n{}  </Rvecs>\n  <Tvecs>\n{}  </Tvecs>\n  <FrameSize>{} {}</FrameSize>\n</opencv_storage>\n",
            join(&k.concat()),
            join(&self.dist_coeffs),
            vec3_list("Rvec", &self.rvecs),
            vec3_list("Tvec", &self.tvecs),
            self.frame_size.0,
            self.frame_size.1,
        )
    }

    /// Writes the artifact to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        std::fs::write(path, self.to_xml_string())?;
        Ok(())
    }

    /// Focal length along x.
    #[inline]
    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }

    /// Focal length along y.
    #[inline]
    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }

    /// Pinhole parameters for a frame of the given size.
    ///
    /// The focal lengths come from the calibration, the principal point from
    /// the current frame: `cx` is half the number of rows and `cy` half the
    /// number of columns. The robot's heading correction was fitted against
    /// poses computed this way, so the axes are kept as they are.
    pub fn camera_frame_params(&self, width: u32, height: u32) -> CameraIntrinsics {
        CameraIntrinsics::new(
            self.fx(),
            self.fy(),
            height as f64 / 2.0,
            width as f64 / 2.0,
        )
    }
}

fn child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> Result<Node<'a, 'input>, CalibrationError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or(CalibrationError::MissingElement(name))
}

fn parse_floats(node: Node, element: &'static str) -> Result<Vec<f64>, CalibrationError> {
    node.text()
        .unwrap_or_default()
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| CalibrationError::InvalidValue {
                element,
                value: tok.to_string(),
            })
        })
        .collect()
}

fn parse_vec3_list(node: Node, element: &'static str) -> Result<Vec<[f64; 3]>, CalibrationError> {
    node.children()
        .filter(|n| n.is_element())
        .map(|n| {
            let v = parse_floats(n, element)?;
            match v[..] {
                [x, y, z] => Ok([x, y, z]),
                _ => Err(CalibrationError::WrongLength {
                    element,
                    expected: 3,
                    actual: v.len(),
                }),
            }
        })
        .collect()
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<CameraMatrix>
  612.5 0 320.1
  0 611.0 239.7
  0 0 1
</CameraMatrix>
<DistCoeffs>-0.31 0.12 0.001 -0.002</DistCoeffs>
<Rvecs>
  <_>0.1 0.2 0.3</_>
  <_>-0.1 0.0 0.05</_>
</Rvecs>
<Tvecs>
  <_>0.01 0.02 0.5</_>
  <_>0.0 -0.03 0.45</_>
</Tvecs>
<FrameSize>640 480</FrameSize>
</opencv_storage>
"#;

    fn sample() -> CalibrationBundle {
        CalibrationBundle {
            camera_matrix: [[600.0, 0.0, 320.0], [0.0, 605.5, 240.0], [0.0, 0.0, 1.0]],
            dist_coeffs: vec![-0.3, 0.1, 0.0, 0.001, -0.02],
            rvecs: vec![[0.1, -0.2, 0.3]],
            tvecs: vec![[0.05, 0.0, 0.7]],
            frame_size: (640, 480),
        }
    }

    #[test]
    fn test_parse_artifact() -> Result<(), CalibrationError> {
        let bundle = CalibrationBundle::from_xml_str(ARTIFACT)?;
        assert_eq!(bundle.camera_matrix[0], [612.5, 0.0, 320.1]);
        assert_eq!(bundle.camera_matrix[1], [0.0, 611.0, 239.7]);
        assert_eq!(bundle.camera_matrix[2], [0.0, 0.0, 1.0]);
        assert_eq!(bundle.dist_coeffs, vec![-0.31, 0.12, 0.001, -0.002]);
        assert_eq!(bundle.rvecs, vec![[0.1, 0.2, 0.3], [-0.1, 0.0, 0.05]]);
        assert_eq!(bundle.tvecs.len(), 2);
        assert_eq!(bundle.frame_size, (640, 480));
        assert_eq!(bundle.fx(), 612.5);
        assert_eq!(bundle.fy(), 611.0);
        Ok(())
    }

    #[test]
    fn test_xml_round_trip() -> Result<(), CalibrationError> {
        let bundle = sample();
        let parsed = CalibrationBundle::from_xml_str(&bundle.to_xml_string())?;
        assert_eq!(parsed, bundle);
        Ok(())
    }

    #[test]
    fn test_empty_distortion_and_extrinsics() -> Result<(), CalibrationError> {
        let bundle = CalibrationBundle {
            dist_coeffs: vec![],
            rvecs: vec![],
            tvecs: vec![],
            ..sample()
        };
        let parsed = CalibrationBundle::from_xml_str(&bundle.to_xml_string())?;
        assert!(parsed.dist_coeffs.is_empty());
        assert!(parsed.rvecs.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_element() {
        let text = ARTIFACT.replace("<FrameSize>640 480</FrameSize>", "");
        assert!(matches!(
            CalibrationBundle::from_xml_str(&text),
            Err(CalibrationError::MissingElement("FrameSize"))
        ));
    }

    #[test]
    fn test_malformed_values() {
        let short = ARTIFACT.replace("0 0 1\n", "0 0\n");
        assert!(matches!(
            CalibrationBundle::from_xml_str(&short),
            Err(CalibrationError::WrongLength {
                element: "CameraMatrix",
                expected: 9,
                actual: 8
            })
        ));

        let token = ARTIFACT.replace("640 480", "640 abc");
        assert!(matches!(
            CalibrationBundle::from_xml_str(&token),
            Err(CalibrationError::InvalidValue {
                element: "FrameSize",
                ..
            })
        ));

        let rvec = ARTIFACT.replace("<_>0.1 0.2 0.3</_>", "<_>0.1 0.2</_>");
        assert!(matches!(
            CalibrationBundle::from_xml_str(&rvec),
            Err(CalibrationError::WrongLength {
                element: "Rvecs",
                ..
            })
        ));

        assert!(matches!(
            CalibrationBundle::from_xml_str("<opencv_storage>"),
            Err(CalibrationError::Xml(_))
        ));
    }

    #[test]
    fn test_camera_frame_params_uses_image_shape() {
        let params = sample().camera_frame_params(640, 480);
        assert_eq!(params.fx, 600.0);
        assert_eq!(params.fy, 605.5);
        // rows / 2 and cols / 2, not the calibration principal point
        assert_eq!(params.cx, 240.0);
        assert_eq!(params.cy, 320.0);
    }

    struct WritingCalibrator(CalibrationBundle);

    impl Calibrator for WritingCalibrator {
        fn calibrate(&self, dir: &Path) -> Result<(), CalibrationError> {
            self.0.save(CalibrationBundle::artifact_path(dir))
        }
    }

    #[test]
    fn test_load_or_calibrate() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        let res = CalibrationBundle::load_or_calibrate(dir.path(), &NoCalibrator);
        assert!(matches!(res, Err(CalibrationError::Missing(_))));

        let bundle = CalibrationBundle::load_or_calibrate(dir.path(), &WritingCalibrator(sample()))?;
        assert_eq!(bundle, sample());

        // the artifact now exists, so the calibrator is not consulted
        let again = CalibrationBundle::load_or_calibrate(dir.path(), &NoCalibrator)?;
        assert_eq!(again, sample());
        Ok(())
    }
}
