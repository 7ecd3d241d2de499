#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use nalgebra::{Matrix3, Rotation3, Vector3};
use opencv::{
    core::{self, Mat, Rect, Scalar, Size, Vector},
    imgcodecs, imgproc,
    prelude::*,
};

use camcal::CheckerboardSize;
use checkerboard_cal::{Camera, CameraModule, CameraSource, Config, Error, Key, Preview};

pub const IMAGE_WIDTH: i32 = 640;
pub const IMAGE_HEIGHT: i32 = 480;
pub const FOCAL_LENGTH: f64 = 600.0;

const SQUARE_PX: i32 = 40;
const MARGIN_PX: i32 = 40;

pub fn board() -> CheckerboardSize {
    CheckerboardSize::new(9, 6)
}

/// A config pointing into `root`.
pub fn config_in(root: &Utf8Path) -> Config {
    let mut cfg = Config::new(board(), CameraSource::Device(0));
    cfg.images_dir = root.join("imgs");
    cfg.result_file = root.join("calibration.xml");
    cfg
}

pub fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

// ---------------------------
// synthetic images

/// Flat printed checkerboard with a white margin, one pixel per unit.
fn board_texture(size: CheckerboardSize) -> Mat {
    let squares_x = size.n_cols as i32 + 1;
    let squares_y = size.n_rows as i32 + 1;
    let mut img = Mat::new_rows_cols_with_default(
        squares_y * SQUARE_PX + 2 * MARGIN_PX,
        squares_x * SQUARE_PX + 2 * MARGIN_PX,
        core::CV_8UC3,
        Scalar::all(255.0),
    )
    .unwrap();
    for j in 0..squares_y {
        for i in 0..squares_x {
            if (i + j) % 2 == 0 {
                let rect = Rect::new(
                    MARGIN_PX + i * SQUARE_PX,
                    MARGIN_PX + j * SQUARE_PX,
                    SQUARE_PX,
                    SQUARE_PX,
                );
                imgproc::rectangle(&mut img, rect, Scalar::all(0.0), -1, imgproc::LINE_8, 0)
                    .unwrap();
            }
        }
    }
    img
}

pub fn camera_matrix() -> Matrix3<f64> {
    Matrix3::new(
        FOCAL_LENGTH,
        0.0,
        IMAGE_WIDTH as f64 / 2.0,
        0.0,
        FOCAL_LENGTH,
        IMAGE_HEIGHT as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    )
}

/// Render the board as seen by a distortion-free camera. The board is
/// rotated by `rx`, `ry`, `rz` (radians) around its centre, which sits about
/// 18 squares in front of the camera.
pub fn render_view(size: CheckerboardSize, rx: f64, ry: f64, rz: f64) -> Mat {
    let texture = board_texture(size);
    let s = 1.0 / SQUARE_PX as f64;
    let cx = (size.n_cols as f64 - 1.0) / 2.0;
    let cy = (size.n_rows as f64 - 1.0) / 2.0;
    let first_corner = (MARGIN_PX + SQUARE_PX) as f64 * s;
    // texture pixel -> board plane, origin at the board centre
    #[rustfmt::skip]
    let texture_to_board = Matrix3::new(
        s, 0.0, -first_corner - cx,
        0.0, s, -first_corner - cy,
        0.0, 0.0, 1.0,
    );

    let rot = Rotation3::from_euler_angles(rx, ry, rz);
    let t = Vector3::new(0.3 * rz.signum(), -0.2 * rx.signum(), 18.0);
    let r = rot.matrix();
    let extrinsic =
        Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t]);

    let h = camera_matrix() * extrinsic * texture_to_board;
    let row_major: Vec<f64> = h.transpose().iter().copied().collect();
    let h = opencv_calibrate::mat_from_rows(3, &row_major).unwrap();

    let mut out = Mat::default();
    imgproc::warp_perspective(
        &texture,
        &mut out,
        &h,
        Size::new(IMAGE_WIDTH, IMAGE_HEIGHT),
        imgproc::INTER_LINEAR,
        core::BORDER_CONSTANT,
        Scalar::all(255.0),
    )
    .unwrap();
    out
}

/// Fifteen views with tilts up to 25 degrees.
pub fn rendered_views(size: CheckerboardSize) -> Vec<Mat> {
    let tilts_x = [-20.0f64, -10.0, 0.0, 10.0, 20.0];
    let tilts_y = [-25.0f64, 0.0, 25.0];
    let mut views = vec![];
    for (i, ry) in tilts_y.iter().enumerate() {
        for (j, rx) in tilts_x.iter().enumerate() {
            let rz = 0.05 * ((i + j) % 3) as f64 - 0.05;
            views.push(render_view(size, rx.to_radians(), ry.to_radians(), rz));
        }
    }
    views
}

pub fn blank_image(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, Scalar::all(255.0)).unwrap()
}

pub fn write_jpg(path: &Utf8Path, img: &Mat) {
    let params = Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, 95]);
    assert!(imgcodecs::imwrite(path.as_str(), img, &params).unwrap());
}

/// Write `images` as `1.jpg`, `2.jpg`, ... into `dir`.
pub fn write_images(dir: &Utf8Path, images: &[Mat]) {
    std::fs::create_dir_all(dir).unwrap();
    for (i, img) in images.iter().enumerate() {
        write_jpg(&dir.join(format!("{}.jpg", i + 1)), img);
    }
}

/// Insert an EXIF block with the given Orientation tag right after the JPEG
/// start-of-image marker. Pixel data is left untouched.
pub fn tag_exif_orientation(path: &Utf8Path, orientation: u16) {
    let jpg = std::fs::read(path).unwrap();
    assert_eq!(&jpg[..2], &[0xFF, 0xD8]);

    let mut exif = b"Exif\0\0".to_vec();
    // big-endian TIFF header, first IFD at offset 8
    exif.extend_from_slice(b"MM\0\x2a\0\0\0\x08");
    exif.extend_from_slice(&1u16.to_be_bytes());
    // tag 0x0112 (Orientation), type SHORT, count 1, value left-justified
    exif.extend_from_slice(&0x0112u16.to_be_bytes());
    exif.extend_from_slice(&3u16.to_be_bytes());
    exif.extend_from_slice(&1u32.to_be_bytes());
    exif.extend_from_slice(&orientation.to_be_bytes());
    exif.extend_from_slice(&[0, 0]);
    // no next IFD
    exif.extend_from_slice(&0u32.to_be_bytes());

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&exif);
    out.extend_from_slice(&jpg[2..]);
    std::fs::write(path, out).unwrap();
}

// ---------------------------
// scripted camera

/// Frames handed out in order to every camera opened from this module. When
/// the script runs out, `fallback` is delivered forever.
pub struct ScriptedCameraModule {
    frames: Rc<RefCell<VecDeque<Option<Mat>>>>,
    failing_reads: Rc<Cell<usize>>,
    fallback: Option<Mat>,
    pub opened: usize,
    /// Opens beyond this count fail.
    pub max_opens: Option<usize>,
}

impl ScriptedCameraModule {
    pub fn new(frames: Vec<Option<Mat>>, fallback: Option<Mat>) -> Self {
        Self {
            frames: Rc::new(RefCell::new(frames.into())),
            failing_reads: Rc::new(Cell::new(0)),
            fallback,
            opened: 0,
            max_opens: None,
        }
    }

    /// The next `n` reads, from any camera of this module, return an error.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.set(n);
    }

    pub fn remaining(&self) -> usize {
        self.frames.borrow().len()
    }
}

impl CameraModule for ScriptedCameraModule {
    type CameraType = ScriptedCamera;

    fn name(&self) -> &str {
        "scripted"
    }

    fn camera(&mut self, source: &CameraSource) -> checkerboard_cal::Result<ScriptedCamera> {
        if let Some(max) = self.max_opens {
            if self.opened >= max {
                return Err(Error::CameraUnavailable {
                    source_name: source.to_string(),
                });
            }
        }
        self.opened += 1;
        Ok(ScriptedCamera {
            frames: self.frames.clone(),
            failing_reads: self.failing_reads.clone(),
            fallback: self.fallback.as_ref().map(|m| m.try_clone().unwrap()),
        })
    }
}

pub struct ScriptedCamera {
    frames: Rc<RefCell<VecDeque<Option<Mat>>>>,
    failing_reads: Rc<Cell<usize>>,
    fallback: Option<Mat>,
}

impl Camera for ScriptedCamera {
    fn next_frame(&mut self) -> checkerboard_cal::Result<Option<Mat>> {
        if self.failing_reads.get() > 0 {
            self.failing_reads.set(self.failing_reads.get() - 1);
            return Err(opencv::Error::new(core::StsError, "read failed").into());
        }
        if let Some(frame) = self.frames.borrow_mut().pop_front() {
            return Ok(frame);
        }
        Ok(self.fallback.as_ref().map(|m| m.try_clone().unwrap()))
    }
}

// ---------------------------
// scripted preview

/// Records what was shown. Key polls (delay of 1 ms) answer from the
/// script and return ESC once it is used up. Other waits return no key.
#[derive(Default)]
pub struct ScriptedPreview {
    keys: VecDeque<Key>,
    pub shown: Vec<(String, Mat)>,
    pub closed: Vec<String>,
    pub waits: Vec<i32>,
    /// Shows beyond this count fail.
    pub max_shows: Option<usize>,
}

impl ScriptedPreview {
    pub fn new(keys: &[Key]) -> Self {
        Self {
            keys: keys.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn shown_in(&self, window: &str) -> usize {
        self.shown.iter().filter(|(w, _)| w == window).count()
    }
}

impl Preview for ScriptedPreview {
    fn show(&mut self, window: &str, image: &Mat) -> checkerboard_cal::Result<()> {
        if self.max_shows.is_some_and(|max| self.shown.len() >= max) {
            return Err(opencv::Error::new(core::StsError, "window gone").into());
        }
        self.shown.push((window.to_string(), image.try_clone()?));
        Ok(())
    }

    fn wait_key(&mut self, delay_ms: i32) -> checkerboard_cal::Result<Key> {
        self.waits.push(delay_ms);
        if delay_ms != 1 {
            return Ok(Key::None);
        }
        Ok(self.keys.pop_front().unwrap_or(Key::Escape))
    }

    fn close(&mut self, window: &str) -> checkerboard_cal::Result<()> {
        self.closed.push(window.to_string());
        Ok(())
    }
}
