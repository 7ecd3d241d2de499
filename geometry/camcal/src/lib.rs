use nalgebra::Matrix3;
use opencv::core::Mat;

mod storage;
pub use storage::{CAMERA_MATRIX_KEY, DIST_COEFFS_KEY, load_xml, save_xml};

type Coords3D = (f64, f64, f64);
type Coords2D = (f64, f64);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("calibration needs at least one checkerboard view")]
    NoViews,
    #[error("view {index} has {found} points, expected {expected}")]
    WrongPointCount {
        index: usize,
        found: usize,
        expected: usize,
    },
    #[error("calibration file \"{path}\" does not exist")]
    MissingFile { path: String },
    #[error("calibration file \"{path}\" could not be opened")]
    NotOpened { path: String },
    #[error("calibration file \"{path}\" has no \"{key}\" entry")]
    MissingKey { path: String, key: &'static str },
    #[error("entry \"{key}\" has {len} values, expected {expected}")]
    BadEntry {
        key: &'static str,
        len: usize,
        expected: &'static str,
    },
    #[error(transparent)]
    Calibrate(#[from] opencv_calibrate::Error),
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Inner-corner counts of a checkerboard.
///
/// `n_cols` is the number of corners along each board row and `n_rows` the
/// number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerboardSize {
    pub n_cols: u32,
    pub n_rows: u32,
}

impl CheckerboardSize {
    pub fn new(n_cols: u32, n_rows: u32) -> Self {
        Self { n_cols, n_rows }
    }

    pub fn num_corners(&self) -> usize {
        self.n_cols as usize * self.n_rows as usize
    }

    pub fn pattern(&self) -> opencv_calibrate::PatternSize {
        opencv_calibrate::PatternSize::new(self.n_cols, self.n_rows)
    }

    /// Board-plane coordinates of the inner corners, in units of one square.
    ///
    /// Row-major: all corners of row 0 first, each at `(col, row, 0)`.
    pub fn object_points(&self) -> Vec<Coords3D> {
        let mut pts = Vec::with_capacity(self.num_corners());
        for row in 0..self.n_rows {
            for col in 0..self.n_cols {
                pts.push((col as f64, row as f64, 0.0));
            }
        }
        pts
    }
}

impl std::fmt::Display for CheckerboardSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} x {}", self.n_cols, self.n_rows)
    }
}

/// Detected corner locations of one checkerboard view.
#[derive(Debug, Clone)]
pub struct CheckerBoardData {
    size: CheckerboardSize,
    points: Vec<Coords2D>,
}

impl CheckerBoardData {
    pub fn new(size: CheckerboardSize, points: &[Coords2D]) -> Self {
        let points = points.to_vec();
        Self { size, points }
    }

    pub fn points(&self) -> &[Coords2D] {
        &self.points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for PixelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Camera matrix and lens distortion coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    pub camera_matrix: Matrix3<f64>,
    /// OpenCV ordering: k1, k2, p1, p2[, k3[, ...]]
    pub dist_coeffs: Vec<f64>,
}

impl CameraIntrinsics {
    pub fn camera_matrix_mat(&self) -> Result<Mat> {
        let row_major: Vec<f64> = self.camera_matrix.transpose().iter().copied().collect();
        Ok(opencv_calibrate::mat_from_rows(3, &row_major)?)
    }

    pub fn dist_coeffs_mat(&self) -> Result<Mat> {
        Ok(opencv_calibrate::mat_from_rows(1, &self.dist_coeffs)?)
    }
}

/// Everything the calibration solver reports.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub intrinsics: CameraIntrinsics,
    pub image_size: PixelSize,
    /// RMS reprojection error in pixels.
    pub rms_reprojection_error: f64,
    pub num_views: usize,
    /// Per view (rotation vector, translation vector).
    pub poses: Vec<([f64; 3], [f64; 3])>,
}

/// Given some checkerboard corner locations, compute intrinsics using OpenCV.
///
/// Every view is paired with the same planar object-point template.
pub fn compute_intrinsics(size: PixelSize, data: &[CheckerBoardData]) -> Result<Calibration> {
    if data.is_empty() {
        return Err(Error::NoViews);
    }

    use opencv_calibrate::CorrespondingPoint;
    let mut pts: Vec<Vec<CorrespondingPoint>> = Vec::with_capacity(data.len());
    for (index, board) in data.iter().enumerate() {
        let template = board.size.object_points();
        if template.len() != board.points.len() {
            return Err(Error::WrongPointCount {
                index,
                found: board.points.len(),
                expected: template.len(),
            });
        }
        pts.push(
            template
                .into_iter()
                .zip(board.points.iter().copied())
                .map(|(object_point, image_point)| CorrespondingPoint {
                    object_point,
                    image_point,
                })
                .collect(),
        );
    }

    let raw = opencv_calibrate::calibrate_camera(&pts, size.width, size.height)?;
    tracing::debug!("solver used {} views of a {size} image", pts.len());

    Ok(Calibration {
        intrinsics: CameraIntrinsics {
            camera_matrix: Matrix3::from_row_slice(&raw.camera_matrix),
            dist_coeffs: raw.distortion_coeffs,
        },
        image_size: size,
        rms_reprojection_error: raw.mean_reprojection_error,
        num_views: pts.len(),
        poses: raw
            .rotation_vectors
            .into_iter()
            .zip(raw.translation_vectors)
            .collect(),
    })
}
