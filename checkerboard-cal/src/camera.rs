use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::debug;

use crate::config::CameraSource;
use crate::errors::{Error, Result};

// ---------------------------
// CameraModule

/// Something able to open cameras.
pub trait CameraModule {
    type CameraType: Camera;

    fn name(&self) -> &str;
    /// Open `source`. Fails with [Error::CameraUnavailable] if it cannot be
    /// opened.
    fn camera(&mut self, source: &CameraSource) -> Result<Self::CameraType>;
}

// ---------------------------
// Camera

/// An open frame source. Dropping it releases the device.
pub trait Camera {
    /// Grab and decode the next frame. `Ok(None)` means the source
    /// delivered nothing this time.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}

// ---------------------------
// OpenCV backend

#[derive(Debug, Default)]
pub struct OpencvCameraModule {}

impl OpencvCameraModule {
    pub fn new() -> Self {
        Self {}
    }
}

impl CameraModule for OpencvCameraModule {
    type CameraType = OpencvCamera;

    fn name(&self) -> &str {
        "opencv-videoio"
    }

    fn camera(&mut self, source: &CameraSource) -> Result<OpencvCamera> {
        let cap = match source {
            CameraSource::Device(idx) => VideoCapture::new(*idx, videoio::CAP_ANY)?,
            CameraSource::Url(url) => VideoCapture::from_file(url, videoio::CAP_ANY)?,
        };
        if !cap.is_opened()? {
            return Err(Error::CameraUnavailable {
                source_name: source.to_string(),
            });
        }
        debug!("opened camera \"{source}\"");
        Ok(OpencvCamera { cap })
    }
}

pub struct OpencvCamera {
    cap: VideoCapture,
}

impl Camera for OpencvCamera {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.cap.read(&mut frame)? || opencv_calibrate::is_empty(&frame)? {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

impl Drop for OpencvCamera {
    fn drop(&mut self) {
        if let Err(e) = self.cap.release() {
            debug!("releasing capture failed: {e}");
        }
    }
}
