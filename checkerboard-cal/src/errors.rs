use camino::Utf8PathBuf;

pub const WRONG_PARAMETERS_MSG: &str = "Not enough parameters!";

pub type Result<M> = std::result::Result<M, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not enough parameters! {reason}")]
    Configuration { reason: String },
    #[error("camera \"{source_name}\" could not be opened")]
    CameraUnavailable { source_name: String },
    #[error("no .jpg images in \"{dir}\"")]
    NoImages { dir: Utf8PathBuf },
    #[error("could not read image \"{path}\"")]
    UnreadableImage { path: Utf8PathBuf },
    #[error("image \"{path}\" is {found}, expected {expected} like the other images")]
    ResolutionMismatch {
        path: Utf8PathBuf,
        expected: camcal::PixelSize,
        found: camcal::PixelSize,
    },
    #[error("checkerboard corners were found in none of the {processed} images")]
    CalibrationInputInsufficient { processed: usize },
    #[error("calibration could not be loaded: {source}")]
    MissingCalibration {
        #[source]
        source: camcal::Error,
    },
    #[error("could not write image \"{path}\"")]
    ImageWrite { path: Utf8PathBuf },
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(std::path::PathBuf),
    #[error(transparent)]
    Camcal(#[from] camcal::Error),
    #[error(transparent)]
    Calibrate(#[from] opencv_calibrate::Error),
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("image header error: {0}")]
    ImageHeader(#[from] image::ImageError),
    #[error("glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
