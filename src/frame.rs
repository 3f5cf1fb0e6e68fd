//! Frame container shared by every pipeline stage.
//!
//! - `Frame`: immutable RGB8 pixel grid (height x width x 3). Stages that change
//!   pixels produce a new `Frame`; there is no `&mut` access to the grid.
//! - `Viewport`: the display area frames are fitted to before detection.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::sync::Arc;

/// Number of color channels per pixel.
pub const CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Immutable RGB8 frame. Cloning shares the pixel buffer.
#[derive(Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    /// 1-based position within the source that produced it (0 when unknown).
    index: u64,
}

impl Frame {
    /// Build a frame from tightly packed RGB24 bytes.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if width == 0 || height == 0 {
            return Err(anyhow!("frame must be non-empty, got {}x{}", width, height));
        }
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", width, height))?;
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
            index: 0,
        }
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGB24 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copy the pixel grid into a new owned image for a stage that draws on it.
    pub fn to_image(&self) -> RgbImage {
        (*self.image).clone()
    }

    /// Scale to fit inside the viewport, preserving aspect ratio.
    pub fn resize_to_fit(&self, viewport: Viewport) -> Frame {
        let (width, height) = viewport.fit(self.width(), self.height());
        self.resize_exact(width, height)
    }

    pub fn resize_exact(&self, width: u32, height: u32) -> Frame {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        let resized = imageops::resize(&*self.image, width, height, FilterType::Triangle);
        Frame {
            image: Arc::new(resized),
            index: self.index,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Viewport
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest size with the source aspect ratio that fits the viewport.
    ///
    /// When the viewport is wider than the source, height is pinned and width
    /// scales; otherwise width is pinned and height scales.
    pub fn fit(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        if src_width == 0 || src_height == 0 || self.width == 0 || self.height == 0 {
            return (src_width.max(1), src_height.max(1));
        }
        let aspect = src_width as f64 / src_height as f64;
        let viewport_aspect = self.width as f64 / self.height as f64;
        let (width, height) = if viewport_aspect > aspect {
            ((self.height as f64 * aspect) as u32, self.height)
        } else {
            (self.width, (self.width as f64 / aspect) as u32)
        };
        (width.max(1), height.max(1))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
