//! Synthetic sources for `stub://` locations.
//!
//! Query parameters shape the clip:
//! - `frames=N`   finite clip of N frames (omitted = endless, like a camera)
//! - `corrupt=K`  frame K (1-based) fails to decode
//! - `width=W`, `height=H`  frame size (default 64x48, at most 8K UHD worth of pixels)
//! - `count=C`    number of synthetic camera indices (device roots only)

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::FramePull;
use crate::frame::Frame;

const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_HEIGHT: u32 = 48;
const CHANNELS: u32 = 3;
const MAX_FRAME_BYTES: u32 = 7680 * 4320 * CHANNELS;

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticParams {
    pub name: String,
    pub frames: Option<u64>,
    pub corrupt_at: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub count: u32,
}

impl SyntheticParams {
    pub fn parse(location: &str) -> Result<Self> {
        let url = Url::parse(location).with_context(|| format!("parse stub location {}", location))?;
        if url.scheme() != "stub" {
            return Err(anyhow!("expected a stub:// location, got {}", location));
        }
        let mut params = SyntheticParams {
            name: url.host_str().unwrap_or("synthetic").to_string(),
            frames: None,
            corrupt_at: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            count: 1,
        };
        for (key, value) in url.query_pairs() {
            let bad = || format!("invalid stub parameter {}={}", key, value);
            match key.as_ref() {
                "frames" => params.frames = Some(value.parse().with_context(bad)?),
                "corrupt" => params.corrupt_at = Some(value.parse().with_context(bad)?),
                "width" => params.width = value.parse().with_context(bad)?,
                "height" => params.height = value.parse().with_context(bad)?,
                "count" => params.count = value.parse().with_context(bad)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if params.width == 0 || params.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        let frame_bytes = params
            .width
            .checked_mul(params.height)
            .and_then(|pixels| pixels.checked_mul(CHANNELS));
        if frame_bytes.map_or(true, |bytes| bytes > MAX_FRAME_BYTES) {
            return Err(anyhow!(
                "stub frame size {}x{} is too large",
                params.width,
                params.height
            ));
        }
        Ok(params)
    }
}

/// Scripted clip producing a moving gradient.
pub struct SyntheticClip {
    params: SyntheticParams,
    frame_count: u64,
    finished: bool,
}

impl SyntheticClip {
    pub fn new(params: SyntheticParams) -> Self {
        Self {
            params,
            frame_count: 0,
            finished: false,
        }
    }

    pub fn next_frame(&mut self) -> Result<FramePull> {
        if self.finished {
            return Ok(FramePull::EndOfStream);
        }
        if let Some(total) = self.params.frames {
            if self.frame_count >= total {
                self.finished = true;
                return Ok(FramePull::EndOfStream);
            }
        }

        self.frame_count += 1;
        if self.params.corrupt_at == Some(self.frame_count) {
            self.finished = true;
            return Err(anyhow!(
                "{}: frame {} failed to decode",
                self.params.name,
                self.frame_count
            ));
        }

        let pixels = self.generate_pixels();
        let frame = Frame::from_rgb(self.params.width, self.params.height, pixels)?;
        Ok(FramePull::Frame(frame.with_index(self.frame_count)))
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let len = self.params.width as usize * self.params.height as usize * CHANNELS as usize;
        let mut pixels = vec![0u8; len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count * 7) % 256) as u8;
        }
        pixels
    }
}
