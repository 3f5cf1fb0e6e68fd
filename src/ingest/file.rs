//! Local file frame source.
//!
//! `FileSource` decodes a local video container one frame at a time.
//! The file source is responsible for:
//! - Rejecting URL schemes (remote clips go through `RemoteSource`)
//! - Reporting a missing or undecodable file as `SourceError::Unavailable`
//! - Releasing the decoder handle on `close()`

use anyhow::{anyhow, Result};

use super::synthetic::{SyntheticClip, SyntheticParams};
use super::{FramePull, FrameSource};
#[cfg(feature = "decode-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::error::SourceError;

/// Local file frame source.
pub struct FileSource {
    path: String,
    backend: Option<FileBackend>,
    frames_captured: u64,
}

enum FileBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "decode-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(path: &str) -> Result<Self, SourceError> {
        let backend = open_backend(path).map_err(|e| SourceError::unavailable(path, e))?;
        log::info!("FileSource: opened {}", path);
        Ok(Self {
            path: path.to_string(),
            backend: Some(backend),
            frames_captured: 0,
        })
    }
}

fn open_backend(path: &str) -> Result<FileBackend> {
    if !is_local_file_path(path) {
        return Err(anyhow!(
            "file sources only support local paths (no URL schemes)"
        ));
    }
    if path.starts_with("stub://") {
        return Ok(FileBackend::Synthetic(SyntheticClip::new(
            SyntheticParams::parse(path)?,
        )));
    }
    if !std::path::Path::new(path).is_file() {
        return Err(anyhow!("no such file"));
    }
    #[cfg(feature = "decode-ffmpeg")]
    {
        Ok(FileBackend::Ffmpeg(FfmpegFileSource::open(path)?))
    }
    #[cfg(not(feature = "decode-ffmpeg"))]
    {
        Err(anyhow!("video decoding requires the decode-ffmpeg feature"))
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        self.path.clone()
    }

    fn next_frame(&mut self) -> Result<FramePull> {
        let pulled = match self.backend.as_mut() {
            None => return Ok(FramePull::EndOfStream),
            Some(FileBackend::Synthetic(clip)) => clip.next_frame()?,
            #[cfg(feature = "decode-ffmpeg")]
            Some(FileBackend::Ffmpeg(decoder)) => decoder.next_frame()?,
        };
        if let FramePull::Frame(_) = &pulled {
            self.frames_captured += 1;
        }
        Ok(pulled)
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            log::info!(
                "FileSource: closed {} after {} frames",
                self.path,
                self.frames_captured
            );
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_url_schemes_and_empty_paths() {
        assert!(matches!(
            FileSource::open("https://example.com/clip.mp4"),
            Err(SourceError::Unavailable { .. })
        ));
        assert!(FileSource::open("   ").is_err());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = FileSource::open("/nonexistent/clip.mp4").err().expect("must fail");
        assert!(matches!(err, SourceError::Unavailable { ref source_desc, .. } if source_desc == "/nonexistent/clip.mp4"));
    }

    #[test]
    fn oversized_stub_clip_is_unavailable() {
        assert!(matches!(
            FileSource::open("stub://clip?width=70000&height=70000"),
            Err(SourceError::Unavailable { .. })
        ));
    }

    #[test]
    fn close_is_idempotent_and_ends_stream() -> Result<()> {
        let mut source = FileSource::open("stub://clip?frames=5")?;
        assert!(matches!(source.next_frame()?, FramePull::Frame(_)));
        source.close();
        source.close();
        assert!(matches!(source.next_frame()?, FramePull::EndOfStream));
        Ok(())
    }
}
