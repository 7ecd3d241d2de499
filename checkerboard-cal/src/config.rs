use camino::Utf8PathBuf;

use camcal::CheckerboardSize;

use crate::args::{flag_value, has_flag};
use crate::errors::{Error, Result};

pub const IMAGES_FOLDER_NAME: &str = "imgs";
pub const RESULT_FILE_NAME: &str = "calibration.xml";

/// Where frames come from: a device index or a file/stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    Device(i32),
    Url(String),
}

impl CameraSource {
    /// Interpret a `-v` value. All digits (optionally signed) means a device
    /// index, anything else is passed to the capture backend as a URL.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<i32>() {
            Ok(idx) => Some(Self::Device(idx)),
            Err(_) => Some(Self::Url(raw.to_string())),
        }
    }
}

impl std::fmt::Display for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Device(idx) => write!(f, "{idx}"),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Immutable settings shared by all three procedures.
#[derive(Debug, Clone)]
pub struct Config {
    pub checkerboard: CheckerboardSize,
    pub camera: CameraSource,
    pub images_dir: Utf8PathBuf,
    pub result_file: Utf8PathBuf,
}

impl Config {
    pub fn new(checkerboard: CheckerboardSize, camera: CameraSource) -> Self {
        Self {
            checkerboard,
            camera,
            images_dir: IMAGES_FOLDER_NAME.into(),
            result_file: RESULT_FILE_NAME.into(),
        }
    }

    /// Build the configuration from `-h`, `-w` and `-v`.
    ///
    /// Both checkerboard dimensions must be positive and the camera source
    /// non-empty.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let n_cols = flag_value(args, "-h").map(parse_dimension).unwrap_or(0);
        let n_rows = flag_value(args, "-w").map(parse_dimension).unwrap_or(0);
        let camera = flag_value(args, "-v").and_then(CameraSource::parse);

        if n_cols <= 0 || n_rows <= 0 {
            return Err(Error::Configuration {
                reason: format!(
                    "checkerboard size must be positive (got -h {n_cols} -w {n_rows})"
                ),
            });
        }
        let Some(camera) = camera else {
            return Err(Error::Configuration {
                reason: "camera source (-v) is missing".into(),
            });
        };
        // positive and within i32 range here
        let checkerboard = CheckerboardSize::new(n_cols as u32, n_rows as u32);
        Ok(Self::new(checkerboard, camera))
    }
}

/// Which procedures to run. They always run in the order collect, calibrate,
/// apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modes {
    pub collect: bool,
    pub calibrate: bool,
    pub apply: bool,
}

impl Modes {
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        Self {
            collect: has_flag(args, "-i"),
            calibrate: has_flag(args, "-c"),
            apply: has_flag(args, "-a"),
        }
    }

    pub fn any(&self) -> bool {
        self.collect || self.calibrate || self.apply
    }
}

/// Lenient integer parse: optional leading whitespace and sign, then as many
/// digits as are present. Anything unparsable is zero, values outside the
/// `i32` range saturate.
pub fn parse_dimension(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let mut value: i64 = 0;
    for c in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(c - b'0')).min(i64::from(i32::MAX) + 1);
    }
    (sign * value).clamp(i64::from(i32::MIN), i64::from(i32::MAX))
}
