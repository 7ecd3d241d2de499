use eyre::{Context, Result};
use opencv::core::LogLevel;
use tracing::{error, info, warn};

use checkerboard_cal::{Config, Error, HighGui, Modes, OpencvCameraModule, args::flag_value};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let cfg = match Config::from_args(&args) {
        Ok(cfg) => cfg,
        Err(e @ Error::Configuration { .. }) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    env_tracing_logger::initiate_logging(flag_value(&args, "--log-file"), false)
        .wrap_err("setting up logging")?;
    opencv::core::set_log_level(LogLevel::LOG_LEVEL_SILENT)
        .wrap_err("silencing OpenCV log")?;

    let modes = Modes::from_args(&args);
    if !modes.any() {
        warn!("Nothing to do. Pass -i to collect images, -c to calibrate, -a to preview.");
    }

    let mut module = OpencvCameraModule::new();
    let mut preview = HighGui::new();
    match checkerboard_cal::run(&cfg, modes, &mut module, &mut preview) {
        Ok(summary) => {
            if let Some(report) = summary.calibration {
                info!(
                    "Calibrated from {} of {} images, RMS error {} px",
                    report.views.len(),
                    report.processed,
                    report.calibration.rms_reprojection_error
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            Err(e).wrap_err("checkerboard calibration failed")
        }
    }
}
