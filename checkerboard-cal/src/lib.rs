//! Checkerboard camera calibration: collect reference images from a live
//! camera, compute the intrinsics from them and preview the undistorted
//! stream.

use tracing::info;

pub mod apply;
pub mod args;
pub mod calibrate;
pub mod camera;
pub mod collect;
pub mod config;
mod errors;
pub mod preview;

pub use crate::apply::{ApplyStats, apply_calibration};
pub use crate::calibrate::{CalibrationReport, calibrate};
pub use crate::camera::{Camera, CameraModule, OpencvCameraModule};
pub use crate::collect::collect_images;
pub use crate::config::{CameraSource, Config, Modes};
pub use crate::errors::{Error, Result, WRONG_PARAMETERS_MSG};
pub use crate::preview::{HighGui, Key, Preview};

/// What the requested procedures produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub collected: Option<usize>,
    pub calibration: Option<CalibrationReport>,
    pub applied: Option<ApplyStats>,
}

/// Run the requested procedures in the order collect, calibrate, apply.
///
/// The first failing procedure ends the run.
pub fn run<M, P>(cfg: &Config, modes: Modes, module: &mut M, preview: &mut P) -> Result<RunSummary>
where
    M: CameraModule,
    P: Preview,
{
    info!("CHECKERBOARD size: {}", cfg.checkerboard);
    info!("Camera source: {} (via {})", cfg.camera, module.name());

    let mut summary = RunSummary::default();
    if modes.collect {
        summary.collected = Some(collect_images(cfg, module, preview)?);
    }
    if modes.calibrate {
        summary.calibration = Some(calibrate(cfg, preview)?);
    }
    if modes.apply {
        summary.applied = Some(apply_calibration(cfg, module, preview)?);
    }
    Ok(summary)
}
