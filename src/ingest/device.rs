//! Camera device frame source.
//!
//! Devices are addressed by index. The index is appended to the configured
//! device root (`/dev/video` + `0` = `/dev/video0`). A `stub://` root opens
//! synthetic cameras instead, `count` of them (default 1).
//!
//! Enumeration (`probe_devices`) is best effort: indices are opened one after
//! another and kept when they deliver a frame. Nothing stops a device from
//! appearing or vanishing between the probe and a later open.

use anyhow::{anyhow, Result};
use std::fmt;

use super::synthetic::{SyntheticClip, SyntheticParams};
use super::{FramePull, FrameSource};
use crate::config::DeviceSettings;
use crate::error::SourceError;

/// Index of a camera that answered a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Camera {}", self.0)
    }
}

/// Camera frame source.
pub struct DeviceSource {
    location: String,
    backend: Option<DeviceBackend>,
    frames_captured: u64,
}

enum DeviceBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "camera-v4l2")]
    V4l2(v4l2::V4l2Capture),
}

impl DeviceSource {
    pub fn open(index: u32, settings: &DeviceSettings) -> Result<Self, SourceError> {
        let location = device_location(&settings.root, index);
        let backend = open_backend(index, settings)
            .map_err(|e| SourceError::unavailable(location.clone(), e))?;
        log::info!("DeviceSource: opened {}", location);
        Ok(Self {
            location,
            backend: Some(backend),
            frames_captured: 0,
        })
    }
}

fn device_location(root: &str, index: u32) -> String {
    if root.starts_with("stub://") {
        format!("{}#{}", root, index)
    } else {
        format!("{}{}", root, index)
    }
}

fn open_backend(index: u32, settings: &DeviceSettings) -> Result<DeviceBackend> {
    if settings.root.starts_with("stub://") {
        let params = SyntheticParams::parse(&settings.root)?;
        if index >= params.count {
            return Err(anyhow!(
                "synthetic camera {} not present ({} configured)",
                index,
                params.count
            ));
        }
        return Ok(DeviceBackend::Synthetic(SyntheticClip::new(params)));
    }
    #[cfg(feature = "camera-v4l2")]
    {
        let path = device_location(&settings.root, index);
        Ok(DeviceBackend::V4l2(v4l2::V4l2Capture::open(&path, settings)?))
    }
    #[cfg(not(feature = "camera-v4l2"))]
    {
        Err(anyhow!("camera capture requires the camera-v4l2 feature"))
    }
}

impl FrameSource for DeviceSource {
    fn describe(&self) -> String {
        self.location.clone()
    }

    fn next_frame(&mut self) -> Result<FramePull> {
        let pulled = match self.backend.as_mut() {
            None => return Ok(FramePull::EndOfStream),
            Some(DeviceBackend::Synthetic(clip)) => clip.next_frame()?,
            #[cfg(feature = "camera-v4l2")]
            Some(DeviceBackend::V4l2(capture)) => capture.next_frame()?,
        };
        if let FramePull::Frame(_) = &pulled {
            self.frames_captured += 1;
        }
        Ok(pulled)
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            log::info!(
                "DeviceSource: released {} after {} frames",
                self.location,
                self.frames_captured
            );
        }
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Probe indices `0..max_probe` and return those that deliver a frame.
///
/// Each probe handle is released before the next index is tried.
pub fn probe_devices(settings: &DeviceSettings) -> Vec<DeviceId> {
    let mut found = Vec::new();
    for index in 0..settings.max_probe {
        let mut source = match DeviceSource::open(index, settings) {
            Ok(source) => source,
            Err(err) => {
                log::debug!("probe: index {} unavailable: {}", index, err);
                continue;
            }
        };
        match source.next_frame() {
            Ok(FramePull::Frame(_)) => found.push(DeviceId(index)),
            Ok(FramePull::EndOfStream) => log::debug!("probe: index {} gave no frame", index),
            Err(err) => log::debug!("probe: index {} read failed: {}", index, err),
        }
        source.close();
    }
    found
}

// ----------------------------------------------------------------------------
// V4L2 capture using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
mod v4l2 {
    use anyhow::{anyhow, Context, Result};
    use ouroboros::self_referencing;

    use super::super::normalize::{normalize_to_rgb, PixelFormat};
    use super::super::FramePull;
    use crate::config::DeviceSettings;
    use crate::frame::Frame;

    pub(super) struct V4l2Capture {
        state: DeviceState,
        path: String,
        width: u32,
        height: u32,
        format: PixelFormat,
        frame_count: u64,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl V4l2Capture {
        pub(super) fn open(path: &str, settings: &DeviceSettings) -> Result<Self> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device =
                v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {}", path))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = settings.width;
            format.height = settings.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!("DeviceSource: failed to set format on {}: {}", path, err);
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
                anyhow!("unsupported v4l2 pixel format {} on {}", format.fourcc, path)
            })?;

            if settings.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!("DeviceSource: failed to set fps on {}: {}", path, err);
                }
            }

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;

            log::info!(
                "DeviceSource: {} streaming {}x{} {:?}",
                path,
                format.width,
                format.height,
                pixel_format
            );
            Ok(Self {
                state,
                path: path.to_string(),
                width: format.width,
                height: format.height,
                format: pixel_format,
                frame_count: 0,
            })
        }

        pub(super) fn next_frame(&mut self) -> Result<FramePull> {
            use v4l::io::traits::CaptureStream;

            let (width, height, format) = (self.width, self.height, self.format);
            let pixels = self
                .state
                .with_mut(|fields| -> Result<Vec<u8>> {
                    let (buf, meta) = fields.stream.next().context("capture v4l2 frame")?;
                    let used = (meta.bytesused as usize).min(buf.len());
                    let used = if used == 0 { buf.len() } else { used };
                    normalize_to_rgb(&buf[..used], width, height, format)
                })
                .with_context(|| format!("read frame from {}", self.path))?;

            self.frame_count += 1;
            let frame = Frame::from_rgb(width, height, pixels)?.with_index(self.frame_count);
            Ok(FramePull::Frame(frame))
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
