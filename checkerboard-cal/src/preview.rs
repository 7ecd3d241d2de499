//! Operator-facing image windows.

use opencv::{core::Mat, highgui};

use crate::errors::Result;

pub const ESC_KEY: i32 = 27;
pub const SPACE_KEY: i32 = 32;

/// A key press as seen by the procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// The wait timed out.
    None,
    Escape,
    Space,
    Other(i32),
}

impl Key {
    /// Map a raw HighGUI key code. Only the low byte is significant.
    pub fn from_code(code: i32) -> Self {
        if code < 0 {
            return Self::None;
        }
        match code & 0xFF {
            ESC_KEY => Self::Escape,
            SPACE_KEY => Self::Space,
            other => Self::Other(other),
        }
    }
}

/// Where images are shown and keys are read from.
pub trait Preview {
    fn show(&mut self, window: &str, image: &Mat) -> Result<()>;
    /// Wait up to `delay_ms` for a key. Zero blocks until a key is pressed.
    fn wait_key(&mut self, delay_ms: i32) -> Result<Key>;
    fn close(&mut self, window: &str) -> Result<()>;
}

/// OpenCV HighGUI windows.
#[derive(Debug, Default)]
pub struct HighGui {}

impl HighGui {
    pub fn new() -> Self {
        Self {}
    }
}

impl Preview for HighGui {
    fn show(&mut self, window: &str, image: &Mat) -> Result<()> {
        highgui::imshow(window, image)?;
        Ok(())
    }

    fn wait_key(&mut self, delay_ms: i32) -> Result<Key> {
        Ok(Key::from_code(highgui::wait_key(delay_ms)?))
    }

    fn close(&mut self, window: &str) -> Result<()> {
        highgui::destroy_window(window)?;
        Ok(())
    }
}
