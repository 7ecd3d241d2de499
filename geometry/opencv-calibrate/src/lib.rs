//! Thin wrappers around the OpenCV routines used for checkerboard camera
//! calibration.
//!
//! Corner detection, sub-pixel refinement, the calibration solver and the
//! undistortion transform all run inside OpenCV. The functions here fix the
//! parameters used for each call and convert the results into plain Rust
//! types.

use opencv::{
    calib3d,
    core::{self, Mat, Point2f, Point3f, Size, TermCriteria, Vector},
    imgproc,
    prelude::*,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("OpenCV error: {0}")]
    CvError(#[from] opencv::Error),
    #[error("empty image")]
    EmptyImage,
    #[error("no views given to calibration")]
    NoViews,
    #[error("unexpected matrix shape for {name}: {rows}x{cols}")]
    BadShape {
        name: &'static str,
        rows: i32,
        cols: i32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Number of inner corners of a checkerboard pattern.
///
/// `width` is the number of corners along each row, `height` the number of
/// rows. This is the OpenCV `patternSize` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSize {
    pub width: u32,
    pub height: u32,
}

impl PatternSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn num_corners(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn to_cv(self) -> Result<Size> {
        Ok(Size::new(to_i32(self.width)?, to_i32(self.height)?))
    }
}

fn to_i32(v: u32) -> Result<i32> {
    i32::try_from(v).map_err(|_| {
        Error::CvError(opencv::Error::new(
            core::StsOutOfRange,
            format!("value {v} does not fit in i32"),
        ))
    })
}

/// A point with a view in image (2D) and world (3D)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrespondingPoint {
    pub object_point: (f64, f64, f64),
    pub image_point: (f64, f64),
}

#[derive(Debug, Clone)]
pub struct CalibrationResult {
    /// RMS reprojection error, in pixels, as returned by OpenCV
    pub mean_reprojection_error: f64,
    /// camera calibration matrix, row major order
    pub camera_matrix: [f64; 9],
    /// non-linear distortion coefficients (k1, k2, p1, p2, k3)
    pub distortion_coeffs: Vec<f64>,
    /// rotation vectors (Rodrigues), one per view
    pub rotation_vectors: Vec<[f64; 3]>,
    /// translation vectors, one per view
    pub translation_vectors: Vec<[f64; 3]>,
    pub image_width: u32,
    pub image_height: u32,
}

/// Convert a BGR (or already single channel) image to 8 bit grey.
pub fn to_gray(image: &Mat) -> Result<Mat> {
    if is_empty(image)? {
        return Err(Error::EmptyImage);
    }
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }
    let mut gray = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

pub fn is_empty(image: &Mat) -> Result<bool> {
    let size = image.size()?;
    Ok(size.width < 1 || size.height < 1)
}

/// Find the inner corners of a checkerboard in a grey image.
///
/// Returns `Ok(None)` unless exactly the expected number of corners was
/// located and ordered.
pub fn find_chessboard_corners(
    gray: &Mat,
    pattern: PatternSize,
) -> Result<Option<Vector<Point2f>>> {
    if is_empty(gray)? {
        return Err(Error::EmptyImage);
    }
    let mut corners = Vector::<Point2f>::new();
    let flags = calib3d::CALIB_CB_ADAPTIVE_THRESH
        | calib3d::CALIB_CB_FAST_CHECK
        | calib3d::CALIB_CB_NORMALIZE_IMAGE;
    let found = calib3d::find_chessboard_corners(gray, pattern.to_cv()?, &mut corners, flags)?;
    if found && corners.len() == pattern.num_corners() {
        Ok(Some(corners))
    } else {
        Ok(None)
    }
}

/// Refine corner locations to sub-pixel precision in place.
///
/// Uses an 11x11 search window with no dead zone and stops after 30
/// iterations or once a corner moves less than 0.001.
pub fn refine_corners(gray: &Mat, corners: &mut Vector<Point2f>) -> Result<()> {
    let criteria = TermCriteria::new(
        core::TermCriteria_EPS + core::TermCriteria_MAX_ITER,
        30,
        0.001,
    )?;
    imgproc::corner_sub_pix(
        gray,
        corners,
        Size::new(11, 11),
        Size::new(-1, -1),
        criteria,
    )?;
    Ok(())
}

/// Draw detected corners onto a colour image.
pub fn draw_chessboard_corners(
    image: &mut Mat,
    pattern: PatternSize,
    corners: &Vector<Point2f>,
) -> Result<()> {
    calib3d::draw_chessboard_corners(image, pattern.to_cv()?, corners, true)?;
    Ok(())
}

/// Compute intrinsic parameters from per-view point correspondences.
pub fn calibrate_camera(
    all_pts: &[Vec<CorrespondingPoint>],
    width: u32,
    height: u32,
) -> Result<CalibrationResult> {
    if all_pts.is_empty() {
        return Err(Error::NoViews);
    }

    let mut object_points = Vector::<Vector<Point3f>>::new();
    let mut image_points = Vector::<Vector<Point2f>>::new();
    for view in all_pts.iter() {
        let obj: Vector<Point3f> = view
            .iter()
            .map(|pt| {
                let (x, y, z) = pt.object_point;
                Point3f::new(x as f32, y as f32, z as f32)
            })
            .collect();
        let img: Vector<Point2f> = view
            .iter()
            .map(|pt| Point2f::new(pt.image_point.0 as f32, pt.image_point.1 as f32))
            .collect();
        object_points.push(obj);
        image_points.push(img);
    }

    let mut camera_matrix = Mat::default();
    let mut dist_coeffs = Mat::default();
    let mut rvecs = Vector::<Mat>::new();
    let mut tvecs = Vector::<Mat>::new();
    // OpenCV's documented default termination criteria for calibrateCamera.
    let criteria = TermCriteria::new(
        core::TermCriteria_COUNT + core::TermCriteria_EPS,
        30,
        f64::EPSILON,
    )?;
    let rms = calib3d::calibrate_camera(
        &object_points,
        &image_points,
        Size::new(to_i32(width)?, to_i32(height)?),
        &mut camera_matrix,
        &mut dist_coeffs,
        &mut rvecs,
        &mut tvecs,
        0,
        criteria,
    )?;
    tracing::trace!("calibrateCamera returned rms {rms}");

    let camera_matrix = mat_to_vec(&camera_matrix, "camera matrix")?;
    let camera_matrix: [f64; 9] = camera_matrix
        .as_slice()
        .try_into()
        .map_err(|_| Error::BadShape {
            name: "camera matrix",
            rows: 1,
            cols: camera_matrix.len() as i32,
        })?;
    let distortion_coeffs = mat_to_vec(&dist_coeffs, "distortion coefficients")?;

    let rotation_vectors = rvecs
        .iter()
        .map(|m| vec3(&m, "rotation vector"))
        .collect::<Result<Vec<_>>>()?;
    let translation_vectors = tvecs
        .iter()
        .map(|m| vec3(&m, "translation vector"))
        .collect::<Result<Vec<_>>>()?;

    debug_assert!(rotation_vectors.len() == all_pts.len());
    Ok(CalibrationResult {
        mean_reprojection_error: rms,
        camera_matrix,
        distortion_coeffs,
        rotation_vectors,
        translation_vectors,
        image_width: width,
        image_height: height,
    })
}

/// Correct lens distortion of `image` using a 3x3 camera matrix and a
/// distortion coefficient vector.
pub fn undistort(image: &Mat, camera_matrix: &Mat, dist_coeffs: &Mat) -> Result<Mat> {
    if is_empty(image)? {
        return Err(Error::EmptyImage);
    }
    let mut out = Mat::default();
    calib3d::undistort(image, &mut out, camera_matrix, dist_coeffs, &core::no_array())?;
    Ok(out)
}

/// Build an `f64` matrix from row-major data.
pub fn mat_from_rows(rows: usize, data: &[f64]) -> Result<Mat> {
    if rows == 0 || data.is_empty() || data.len() % rows != 0 {
        return Err(Error::BadShape {
            name: "matrix data",
            rows: rows as i32,
            cols: data.len() as i32,
        });
    }
    let cols = data.len() / rows;
    let rows: Vec<&[f64]> = data.chunks(cols).collect();
    Ok(Mat::from_slice_2d(&rows)?)
}

/// Flatten a single channel matrix into row-major `f64` values.
pub fn mat_to_vec(mat: &Mat, name: &'static str) -> Result<Vec<f64>> {
    if mat.channels() != 1 {
        let size = mat.size()?;
        return Err(Error::BadShape {
            name,
            rows: size.height,
            cols: size.width,
        });
    }
    let mut as_f64 = Mat::default();
    mat.convert_to(&mut as_f64, core::CV_64F, 1.0, 0.0)?;
    let rows = as_f64.to_vec_2d::<f64>()?;
    Ok(rows.into_iter().flatten().collect())
}

fn vec3(mat: &Mat, name: &'static str) -> Result<[f64; 3]> {
    let v = mat_to_vec(mat, name)?;
    v.as_slice().try_into().map_err(|_| Error::BadShape {
        name,
        rows: 1,
        cols: v.len() as i32,
    })
}
