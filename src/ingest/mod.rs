//! Frame ingestion sources.
//!
//! Three acquisition modes sit behind one pull interface, `FrameSource`:
//! - Local video files (`FileSource`; decoding needs feature `decode-ffmpeg`)
//! - Camera devices by index (`DeviceSource`; V4L2 needs feature `camera-v4l2`)
//! - Remote clips, downloaded once before playback (`RemoteSource`)
//!
//! Any location starting with `stub://` opens a synthetic source instead, so
//! the pipeline can run headless without codecs or hardware.
//!
//! Sources are responsible for:
//! - Producing RGB24 `Frame`s one at a time
//! - Reporting `FramePull::EndOfStream` at the end of a finite source
//! - Releasing decoder/device handles on `close()` (idempotent)

pub mod device;
pub mod file;
#[cfg(feature = "decode-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod normalize;
pub mod remote;
pub mod synthetic;

use anyhow::Result;
use std::fmt;

use crate::config::{DeviceSettings, RemoteSettings};
use crate::error::SourceError;
use crate::frame::Frame;
use crate::ui::Ui;

pub use device::{probe_devices, DeviceId, DeviceSource};
pub use file::FileSource;
pub use remote::{downloader_for, Downloader, RemoteSource, YtDlpDownloader};
#[cfg(feature = "remote-http")]
pub use remote::HttpDownloader;

/// Result of pulling one frame.
#[derive(Debug)]
pub enum FramePull {
    Frame(Frame),
    /// Finite source exhausted, device gone, or source already closed.
    EndOfStream,
}

/// Pull-based frame source.
///
/// Sources are driven from the single playback thread and need not be `Send`.
pub trait FrameSource {
    /// Human-readable location for logs and error messages.
    fn describe(&self) -> String;

    /// Advance exactly one frame.
    ///
    /// An `Err` means the frame could not be decoded; playback treats it the
    /// same as `EndOfStream`.
    fn next_frame(&mut self) -> Result<FramePull>;

    /// Release decoder/device resources. Safe to call more than once.
    fn close(&mut self);
}

/// What to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    File(String),
    Device(u32),
    Remote(String),
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::File(path) => write!(f, "file {}", path),
            SourceSpec::Device(index) => write!(f, "camera {}", index),
            SourceSpec::Remote(url) => write!(f, "remote {}", url),
        }
    }
}

/// Opens any `SourceSpec` with the configured device root and downloader.
pub struct SourceOpener {
    devices: DeviceSettings,
    remote: RemoteSettings,
    downloader: Box<dyn Downloader>,
    ui: Ui,
}

impl SourceOpener {
    pub fn new(devices: DeviceSettings, remote: RemoteSettings, ui: Ui) -> Self {
        let downloader = downloader_for(&remote);
        Self {
            devices,
            remote,
            downloader,
            ui,
        }
    }

    /// Replace the downloader used for `SourceSpec::Remote`.
    pub fn with_downloader(mut self, downloader: Box<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn open(&self, target: &SourceSpec) -> Result<Box<dyn FrameSource>, SourceError> {
        match target {
            SourceSpec::File(path) => Ok(Box::new(FileSource::open(path)?)),
            SourceSpec::Device(index) => Ok(Box::new(DeviceSource::open(*index, &self.devices)?)),
            SourceSpec::Remote(url) => {
                let _stage = self.ui.stage(&format!("download {}", url));
                Ok(Box::new(RemoteSource::open(
                    url,
                    self.downloader.as_ref(),
                    &self.remote,
                )?))
            }
        }
    }
}
