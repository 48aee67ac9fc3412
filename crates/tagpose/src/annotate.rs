//! Annotated diagnostic images of resolved tags.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::{detection::Detection, error::SensorError, frame::RobotMeasurement};

const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CENTER_RADIUS: i32 = 5;

/// Path of the diagnostic image for `tag_id` under `dir`.
pub fn diagnostic_path(dir: impl AsRef<Path>, tag_id: u32) -> PathBuf {
    dir.as_ref()
        .join("perspective")
        .join(format!("tag{tag_id}_live.jpg"))
}

/// Draws the tag outline and centre onto a copy of `image`.
pub fn annotate(image: &RgbImage, detection: &Detection) -> RgbImage {
    let mut canvas = image.clone();

    // two pixel wide outline
    for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
        for i in 0..4 {
            let a = detection.corners[i];
            let b = detection.corners[(i + 1) % 4];
            draw_line_segment_mut(
                &mut canvas,
                (a[0] as f32 + dx, a[1] as f32 + dy),
                (b[0] as f32 + dx, b[1] as f32 + dy),
                OUTLINE_COLOR,
            );
        }
    }

    let center = (
        detection.center[0].round() as i32,
        detection.center[1].round() as i32,
    );
    draw_filled_circle_mut(&mut canvas, center, CENTER_RADIUS, CENTER_COLOR);

    canvas
}

/// Annotates `image` and writes it to the diagnostic path of the tag.
pub fn write_diagnostic(
    dir: impl AsRef<Path>,
    image: &RgbImage,
    detection: &Detection,
    measurement: &RobotMeasurement,
) -> Result<PathBuf, SensorError> {
    let path = diagnostic_path(dir, detection.tag_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    annotate(image, detection).save(&path)?;

    log::debug!(
        "{}: {} X: {:.6} Y: {:.6} psi: {:.6} -> {}",
        detection.tag_family,
        detection.tag_id,
        measurement.x,
        measurement.y,
        measurement.yaw,
        path.display()
    );

    Ok(path)
}
