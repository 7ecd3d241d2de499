use camino::Utf8PathBuf;
use opencv::{
    core::{self, Mat, Vector},
    imgcodecs,
};
use tracing::{info, warn};

use crate::camera::{Camera, CameraModule};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::preview::{Key, Preview};

pub const COLLECT_INSTRUCTION: &str = "press SPACE to capture the image, ESC to break";
pub const COLLECT_IMAGES_WND: &str =
    "Collect images - press SPACE to capture the image, ESC to break";

const POLL_DELAY_MS: i32 = 1;
const FLASH_DELAY_MS: i32 = 50;

/// Live preview from the camera. Each SPACE press saves the current frame as
/// `<images_dir>/<n>.jpg` (`n` counting from 1), ESC stops.
///
/// Returns the number of images written.
pub fn collect_images<M, P>(cfg: &Config, module: &mut M, preview: &mut P) -> Result<usize>
where
    M: CameraModule,
    P: Preview,
{
    std::fs::create_dir_all(&cfg.images_dir)?;
    let mut cam = module.camera(&cfg.camera)?;
    info!("Collecting images, {COLLECT_INSTRUCTION}");

    let captured = capture_loop(cfg, &mut cam, preview);
    let closed = preview.close(COLLECT_IMAGES_WND);
    let count = captured?;
    closed?;
    info!("Collected {count} images in \"{}\"", cfg.images_dir);
    Ok(count)
}

fn capture_loop<C, P>(cfg: &Config, cam: &mut C, preview: &mut P) -> Result<usize>
where
    C: Camera,
    P: Preview,
{
    let mut count = 0;
    loop {
        let frame = cam.next_frame()?;
        if let Some(frame) = &frame {
            preview.show(COLLECT_IMAGES_WND, frame)?;
        }
        match preview.wait_key(POLL_DELAY_MS)? {
            Key::Escape => return Ok(count),
            Key::Space => {
                let Some(frame) = &frame else {
                    warn!("no frame to save");
                    continue;
                };
                count += 1;
                let path = image_path(cfg, count);
                save_jpg(&path, frame)?;
                info!("Saved {path}");
                flash(preview, frame)?;
            }
            Key::None | Key::Other(_) => {}
        }
    }
}

fn image_path(cfg: &Config, n: usize) -> Utf8PathBuf {
    cfg.images_dir.join(format!("{n}.jpg"))
}

fn save_jpg(path: &Utf8PathBuf, frame: &Mat) -> Result<()> {
    if !imgcodecs::imwrite(path.as_str(), frame, &Vector::new())? {
        return Err(Error::ImageWrite { path: path.clone() });
    }
    Ok(())
}

/// Briefly show the inverted frame to acknowledge a capture.
fn flash<P: Preview>(preview: &mut P, frame: &Mat) -> Result<()> {
    let mut inverted = Mat::default();
    core::bitwise_not_def(frame, &mut inverted)?;
    preview.show(COLLECT_IMAGES_WND, &inverted)?;
    preview.wait_key(FLASH_DELAY_MS)?;
    Ok(())
}
