use opencv::core::{self, Mat};
use tracing::{debug, info, warn};

use crate::camera::{Camera, CameraModule};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::preview::{Key, Preview};

pub const APPLIED_CALIBRATION_WND: &str = "Applied calibration";
/// Frames read and thrown away after opening the camera.
pub const CLEAR_BUFFER_FRAMES: usize = 20;

const POLL_DELAY_MS: i32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub frames_shown: usize,
    pub reconnects: usize,
}

/// Show raw and undistorted video side by side until ESC is pressed.
///
/// A frame that cannot be read or undistorted is skipped and the camera is
/// reopened.
pub fn apply_calibration<M, P>(cfg: &Config, module: &mut M, preview: &mut P) -> Result<ApplyStats>
where
    M: CameraModule,
    P: Preview,
{
    let intrinsics = camcal::load_xml(&cfg.result_file)
        .map_err(|source| Error::MissingCalibration { source })?;
    let camera_matrix = intrinsics.camera_matrix_mat()?;
    let dist_coeffs = intrinsics.dist_coeffs_mat()?;
    info!("Loaded calibration from \"{}\"", cfg.result_file);

    let mut cam = module.camera(&cfg.camera)?;
    for _ in 0..CLEAR_BUFFER_FRAMES {
        if let Err(e) = cam.next_frame() {
            debug!("discarding warm-up frame failed: {e}");
        }
    }

    let shown = preview_loop(cfg, module, cam, &camera_matrix, &dist_coeffs, preview);
    let closed = preview.close(APPLIED_CALIBRATION_WND);
    let stats = shown?;
    closed?;
    info!(
        "Showed {} frames, reconnected {} times",
        stats.frames_shown, stats.reconnects
    );
    Ok(stats)
}

fn preview_loop<M, P>(
    cfg: &Config,
    module: &mut M,
    mut cam: M::CameraType,
    camera_matrix: &Mat,
    dist_coeffs: &Mat,
    preview: &mut P,
) -> Result<ApplyStats>
where
    M: CameraModule,
    P: Preview,
{
    let mut stats = ApplyStats::default();
    loop {
        match undistort_next(&mut cam, camera_matrix, dist_coeffs) {
            Ok(side_by_side) => {
                preview.show(APPLIED_CALIBRATION_WND, &side_by_side)?;
                stats.frames_shown += 1;
            }
            Err(e) => {
                warn!("undistortion failed: {e}, reconnecting to \"{}\"", cfg.camera);
                drop(cam);
                cam = module.camera(&cfg.camera)?;
                stats.reconnects += 1;
            }
        }
        if preview.wait_key(POLL_DELAY_MS)? == Key::Escape {
            return Ok(stats);
        }
    }
}

/// Raw frame on the left, undistorted on the right.
fn undistort_next<C: Camera>(cam: &mut C, camera_matrix: &Mat, dist_coeffs: &Mat) -> Result<Mat> {
    let Some(raw) = cam.next_frame()? else {
        return Err(opencv_calibrate::Error::EmptyImage.into());
    };
    let undistorted = opencv_calibrate::undistort(&raw, camera_matrix, dist_coeffs)?;
    let mut side_by_side = Mat::default();
    core::hconcat2(&raw, &undistorted, &mut side_by_side)?;
    Ok(side_by_side)
}
