//! Camera-frame to robot-frame conversion and heading correction.

use serde::{Deserialize, Serialize};

/// Pose of a tag relative to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotMeasurement {
    /// Forward distance.
    pub x: f64,
    /// Lateral distance.
    pub y: f64,
    /// Heading in radians.
    pub yaw: f64,
}

impl RobotMeasurement {
    /// The measurement as an `(x, y, yaw)` triple.
    #[inline]
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.yaw)
    }
}

/// Scale and offset between the camera frame and the robot frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Camera units to robot units.
    pub scale: f64,
    /// Lateral mounting offset of the camera, in robot units.
    pub lateral_bias: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            scale: 10.0,
            lateral_bias: 0.094,
        }
    }
}

impl FrameConfig {
    /// Robot `(x, y)` from a camera-frame translation: forward is the camera
    /// depth `t[2]`, lateral is `t[0]`.
    #[inline]
    pub fn to_robot_xy(&self, t: &[f64; 3]) -> (f64, f64) {
        (t[2] * self.scale, t[0] * self.scale + self.lateral_bias)
    }
}

/// Heading of the tag from its camera-frame rotation.
///
/// `atan2(R[2][0], sqrt(R[2][1]^2 + R[2][2]^2))`
#[inline]
pub fn yaw_from_rotation(r: &[[f64; 3]; 3]) -> f64 {
    r[2][0].atan2(r[2][1].hypot(r[2][2]))
}

/// Empirical logarithmic correction of the raw heading.
///
/// The bias `a * ln(x) + b` grows with the forward distance `x`. It is added
/// to headings above `threshold` and subtracted otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingCorrection {
    /// Logarithmic coefficient.
    pub a: f64,
    /// Constant term.
    pub b: f64,
    /// Raw heading above which the bias is added.
    pub threshold: f64,
}

impl Default for HeadingCorrection {
    fn default() -> Self {
        Self {
            a: -0.1889984804696413,
            b: -0.2705714669809751,
            threshold: 0.1,
        }
    }
}

impl HeadingCorrection {
    /// The bias at forward distance `x`, `None` where `ln(x)` is undefined.
    #[inline]
    pub fn offset(&self, x: f64) -> Option<f64> {
        if !x.is_finite() || x <= 0.0 {
            return None;
        }
        Some(self.a * x.ln() + self.b)
    }

    /// Corrected heading, `None` when `x` is not a positive distance.
    pub fn apply(&self, yaw: f64, x: f64) -> Option<f64> {
        let offset = self.offset(x)?;
        if yaw > self.threshold {
            Some(yaw + offset)
        } else {
            Some(yaw - offset)
        }
    }
}
