use std::path::PathBuf;

use argh::FromArgs;
use tagpose::{AprilTagSensor, NoCalibrator, ReplayDetector, SensorConfig, TagDetector, TagStatus};

/// Estimates the robot-relative pose of the AprilTags in an image
#[derive(Debug, FromArgs)]
struct Args {
    /// directory holding the camera calibration (default.xml)
    #[argh(positional)]
    calibration_dir: PathBuf,

    /// image path
    #[argh(positional)]
    image: PathBuf,

    /// json file with sensor configuration overrides
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// replay detections from a json file instead of running the detector
    #[argh(option, short = 'r')]
    replay: Option<PathBuf>,

    /// directory for the annotated diagnostic images
    #[argh(option, short = 'd')]
    diagnostics: Option<PathBuf>,

    /// log per-detection diagnostics
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// log setup diagnostics
    #[argh(switch, short = 'l')]
    logging: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    // RUST_LOG still takes precedence over the switches
    let env = env_logger::Env::default().default_filter_or(log_filter(&args));
    env_logger::init_from_env(env);

    let mut config = match &args.config {
        Some(path) => SensorConfig::from_json_file(path)?,
        None => SensorConfig::default(),
    };
    config.verbose |= args.verbose;
    config.logging |= args.logging;
    if args.diagnostics.is_some() {
        config.diagnostics_dir = args.diagnostics.clone();
    }

    let detector: Box<dyn TagDetector> = match &args.replay {
        Some(path) => Box::new(ReplayDetector::from_json_file(path)?),
        None => live_detector()?,
    };

    let mut sensor = AprilTagSensor::new(&args.calibration_dir, &NoCalibrator, detector, config)?;
    let report = sensor.detect(&args.image)?;

    for outcome in &report.outcomes {
        if let TagStatus::Rejected(reason) = &outcome.status {
            log::info!("tag {} rejected: {reason}", outcome.tag_id);
        }
    }

    println!("{}", serde_json::to_string_pretty(&report.measurements)?);

    Ok(())
}

fn log_filter(args: &Args) -> &'static str {
    if args.verbose {
        "debug"
    } else if args.logging {
        "info"
    } else {
        "warn"
    }
}

#[cfg(feature = "apriltag")]
fn live_detector() -> Result<Box<dyn TagDetector>, Box<dyn std::error::Error>> {
    Ok(Box::new(tagpose::AprilTagDetector::tag16h5()?))
}

#[cfg(not(feature = "apriltag"))]
fn live_detector() -> Result<Box<dyn TagDetector>, Box<dyn std::error::Error>> {
    Err("built without the `apriltag` feature, pass --replay <detections.json>".into())
}
