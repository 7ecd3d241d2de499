//! Calibration results in OpenCV `FileStorage` XML.

use std::path::Path;

use nalgebra::Matrix3;
use opencv::core::{FileStorage, FileStorage_READ, FileStorage_WRITE};
use opencv::prelude::*;

use crate::{Calibration, CameraIntrinsics, Error, Result};

pub const CAMERA_MATRIX_KEY: &str = "cameraMatrix";
pub const DIST_COEFFS_KEY: &str = "distCoeffs";

/// Write a calibration, replacing any existing file at `path`.
///
/// Besides the two required matrices, the image size, the RMS reprojection
/// error, the number of views and a timestamp are stored for reference.
pub fn save_xml<P: AsRef<Path>>(
    path: P,
    pkg_name: &str,
    local: chrono::DateTime<chrono::Local>,
    cal: &Calibration,
) -> Result<()> {
    let path_str = path.as_ref().to_string_lossy();
    let mut fs = FileStorage::new_def(&path_str, FileStorage_WRITE)?;
    if !fs.is_opened()? {
        return Err(Error::NotOpened {
            path: path_str.into_owned(),
        });
    }
    fs.write_mat(CAMERA_MATRIX_KEY, &cal.intrinsics.camera_matrix_mat()?)?;
    fs.write_mat(DIST_COEFFS_KEY, &cal.intrinsics.dist_coeffs_mat()?)?;
    fs.write_i32("imageWidth", cal.image_size.width as i32)?;
    fs.write_i32("imageHeight", cal.image_size.height as i32)?;
    fs.write_f64("rmsReprojectionError", cal.rms_reprojection_error)?;
    fs.write_i32("viewCount", cal.num_views as i32)?;
    fs.write_str("calibrationTime", &local.to_rfc3339())?;
    fs.write_str("savedBy", pkg_name)?;
    fs.release()?;
    Ok(())
}

/// Read the camera matrix and distortion coefficients written by
/// [save_xml] (or by any OpenCV program using the same key names).
pub fn load_xml<P: AsRef<Path>>(path: P) -> Result<CameraIntrinsics> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().into_owned();
    if !path.is_file() {
        return Err(Error::MissingFile { path: path_str });
    }
    let fs = FileStorage::new_def(&path_str, FileStorage_READ)?;
    if !fs.is_opened()? {
        return Err(Error::NotOpened { path: path_str });
    }

    let camera_matrix = read_values(&fs, &path_str, CAMERA_MATRIX_KEY)?;
    let camera_matrix: [f64; 9] = camera_matrix
        .as_slice()
        .try_into()
        .map_err(|_| Error::BadEntry {
            key: CAMERA_MATRIX_KEY,
            len: camera_matrix.len(),
            expected: "9",
        })?;
    let dist_coeffs = read_values(&fs, &path_str, DIST_COEFFS_KEY)?;
    if dist_coeffs.len() < 4 {
        return Err(Error::BadEntry {
            key: DIST_COEFFS_KEY,
            len: dist_coeffs.len(),
            expected: "at least 4",
        });
    }

    Ok(CameraIntrinsics {
        camera_matrix: Matrix3::from_row_slice(&camera_matrix),
        dist_coeffs,
    })
}

fn read_values(fs: &FileStorage, path: &str, key: &'static str) -> Result<Vec<f64>> {
    let node = fs.get(key)?;
    if node.is_none()? {
        return Err(Error::MissingKey {
            path: path.to_string(),
            key,
        });
    }
    let mat = node.mat()?;
    if opencv_calibrate::is_empty(&mat)? {
        return Err(Error::MissingKey {
            path: path.to_string(),
            key,
        });
    }
    Ok(opencv_calibrate::mat_to_vec(&mat, key)?)
}
