use camino::{Utf8Path, Utf8PathBuf};
use opencv::{
    core::{Mat, Point, Scalar},
    imgcodecs, imgproc,
    prelude::*,
};
use tracing::{debug, info, warn};

use camcal::{Calibration, CheckerBoardData, CheckerboardSize, PixelSize};

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::preview::Preview;

pub const RESULT_IMAGES_WND: &str = "Result images";

/// Outcome of one calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    /// Images examined, with or without a detected board.
    pub processed: usize,
    /// One correspondence pair per image with a detected board.
    pub views: Vec<CheckerBoardData>,
    pub calibration: Calibration,
}

/// All `*.jpg` files (any case) directly inside `dir`, in lexical order.
pub fn list_images(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let pattern = format!("{}/*.jpg", glob::Pattern::escape(dir.as_str()));
    let opts = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let mut paths = vec![];
    for path in glob::glob_with(&pattern, opts)? {
        let path = Utf8PathBuf::from_path_buf(path?).map_err(Error::NonUtf8Path)?;
        paths.push(path);
    }
    if paths.is_empty() {
        return Err(Error::NoImages {
            dir: dir.to_path_buf(),
        });
    }
    paths.sort();
    Ok(paths)
}

/// Read every image header and make sure all images in `dir` share the
/// resolution of the first one.
pub fn common_resolution(dir: &Utf8Path, paths: &[Utf8PathBuf]) -> Result<PixelSize> {
    let Some((first, rest)) = paths.split_first() else {
        return Err(Error::NoImages {
            dir: dir.to_path_buf(),
        });
    };
    let (w, h) = image::image_dimensions(first)?;
    let expected = PixelSize::new(w, h);
    for path in rest {
        let (w, h) = image::image_dimensions(path)?;
        let found = PixelSize::new(w, h);
        if found != expected {
            return Err(Error::ResolutionMismatch {
                path: path.clone(),
                expected,
                found,
            });
        }
    }
    Ok(expected)
}

/// Detect the checkerboard in every stored image, solve for the intrinsics
/// and write them to the result file.
///
/// Each image is shown for review and the next one is processed after a key
/// press.
pub fn calibrate<P: Preview>(cfg: &Config, preview: &mut P) -> Result<CalibrationReport> {
    let board = cfg.checkerboard;
    let paths = list_images(&cfg.images_dir)?;
    let size = common_resolution(&cfg.images_dir, &paths)?;
    info!(
        "Calibrating from {} images of {size} in \"{}\"",
        paths.len(),
        cfg.images_dir
    );

    let n = paths.len();
    let reviewed = review_images(board, &paths, size, preview);
    let closed = preview.close(RESULT_IMAGES_WND);
    let views = reviewed?;
    closed?;

    if views.is_empty() {
        return Err(Error::CalibrationInputInsufficient { processed: n });
    }

    let calibration = camcal::compute_intrinsics(size, &views)?;
    info!("Camera matrix: {}", calibration.intrinsics.camera_matrix);
    info!(
        "Distortion coefficients: {:?}",
        calibration.intrinsics.dist_coeffs
    );
    info!(
        "RMS reprojection error: {} px",
        calibration.rms_reprojection_error
    );
    for (i, (rvec, tvec)) in calibration.poses.iter().enumerate() {
        debug!("view {i}: rvec {rvec:?} tvec {tvec:?}");
    }

    camcal::save_xml(
        &cfg.result_file,
        env!("CARGO_PKG_NAME"),
        chrono::Local::now(),
        &calibration,
    )?;
    info!("Saved camera calibration to \"{}\"", cfg.result_file);

    Ok(CalibrationReport {
        processed: n,
        views,
        calibration,
    })
}

/// Detect, refine and draw the board in each image, showing every result
/// until a key is pressed.
fn review_images<P: Preview>(
    board: CheckerboardSize,
    paths: &[Utf8PathBuf],
    size: PixelSize,
    preview: &mut P,
) -> Result<Vec<CheckerBoardData>> {
    let n = paths.len();
    let mut views = Vec::with_capacity(n);
    for (i, path) in paths.iter().enumerate() {
        info!("Processing image {} of {n} ...", i + 1);
        let mut frame = load_color(path, size)?;
        let gray = opencv_calibrate::to_gray(&frame)?;

        match opencv_calibrate::find_chessboard_corners(&gray, board.pattern())? {
            Some(mut corners) => {
                opencv_calibrate::refine_corners(&gray, &mut corners)?;
                let points: Vec<(f64, f64)> = corners
                    .iter()
                    .map(|p| (f64::from(p.x), f64::from(p.y)))
                    .collect();
                views.push(CheckerBoardData::new(board, &points));
                opencv_calibrate::draw_chessboard_corners(&mut frame, board.pattern(), &corners)?;
                info!("  checkerboard found in \"{path}\"");
            }
            None => {
                warn!("  no {board} checkerboard in \"{path}\", skipping");
            }
        }

        draw_index(&mut frame, i + 1)?;
        preview.show(RESULT_IMAGES_WND, &frame)?;
        preview.wait_key(0)?;
    }
    Ok(views)
}

/// Decode as BGR in stored pixel order, EXIF orientation ignored like in
/// [common_resolution].
fn load_color(path: &Utf8Path, expected: PixelSize) -> Result<Mat> {
    let frame = imgcodecs::imread(
        path.as_str(),
        imgcodecs::IMREAD_COLOR | imgcodecs::IMREAD_IGNORE_ORIENTATION,
    )?;
    if opencv_calibrate::is_empty(&frame)? {
        return Err(Error::UnreadableImage {
            path: path.to_path_buf(),
        });
    }
    let found = PixelSize::new(frame.cols().max(0) as u32, frame.rows().max(0) as u32);
    if found != expected {
        return Err(Error::ResolutionMismatch {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }
    Ok(frame)
}

fn draw_index(frame: &mut Mat, index: usize) -> Result<()> {
    imgproc::put_text(
        frame,
        &index.to_string(),
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_DUPLEX,
        1.0,
        Scalar::new(0.0, 0.0, 255.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}
