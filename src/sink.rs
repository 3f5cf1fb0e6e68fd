//! Recording of annotated frames.
//!
//! One file per session. The container is YUV4MPEG2 with 4:4:4 chroma: the
//! stream header is written with the first frame, which fixes the frame size
//! for the rest of the file. Later frames of another size are rescaled.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

/// Receives annotated frames in display order.
pub trait OutputSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and release the file. Idempotent.
    fn finish(&mut self) -> Result<()>;

    fn path(&self) -> &Path;

    fn frames_written(&self) -> u64;
}

/// Creates the sink for a newly opened source.
pub trait SinkFactory {
    fn create(&self, path: &Path, fps: u32) -> Result<Box<dyn OutputSink>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Y4mSinkFactory;

impl SinkFactory for Y4mSinkFactory {
    fn create(&self, path: &Path, fps: u32) -> Result<Box<dyn OutputSink>> {
        Ok(Box::new(Y4mSink::create(path, fps)?))
    }
}

pub struct Y4mSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    fps: u32,
    size: Option<(u32, u32)>,
    frames_written: u64,
    plane: Vec<u8>,
}

impl Y4mSink {
    /// Create (or truncate) the output file. Nothing is written until the
    /// first frame arrives.
    pub fn create(path: &Path, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(anyhow!("output fps must be greater than zero"));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("create output file {}", path.display()))?;
        log::info!("Y4mSink: recording to {} at {} fps", path.display(), fps);
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            fps,
            size: None,
            frames_written: 0,
            plane: Vec::new(),
        })
    }
}

impl OutputSink for Y4mSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("output {} already finished", self.path.display()))?;

        let (width, height) = match self.size {
            Some(size) => size,
            None => {
                let size = (frame.width(), frame.height());
                writeln!(
                    writer,
                    "YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C444",
                    size.0, size.1, self.fps
                )
                .context("write y4m header")?;
                self.size = Some(size);
                size
            }
        };

        let frame = frame.resize_exact(width, height);
        rgb_to_yuv444(frame.pixels(), &mut self.plane);
        writer.write_all(b"FRAME\n").context("write y4m frame")?;
        writer.write_all(&self.plane).context("write y4m frame")?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("flush {}", self.path.display()))?;
            log::info!(
                "Y4mSink: closed {} after {} frames",
                self.path.display(),
                self.frames_written
            );
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for Y4mSink {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            log::warn!("Y4mSink: {:#}", err);
        }
    }
}

/// Packed RGB24 to planar BT.601 studio-range Y, Cb, Cr.
fn rgb_to_yuv444(rgb: &[u8], out: &mut Vec<u8>) {
    let pixels = rgb.len() / 3;
    out.clear();
    out.resize(pixels * 3, 0);
    let (y_plane, chroma) = out.split_at_mut(pixels);
    let (u_plane, v_plane) = chroma.split_at_mut(pixels);

    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
        y_plane[i] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8;
        u_plane[i] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
        v_plane[i] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::from_rgb(width, height, pixels).unwrap()
    }

    #[test]
    fn file_exists_at_create_and_header_follows_first_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out/session.y4m");
        let mut sink = Y4mSink::create(&path, 25)?;
        assert!(path.exists());

        sink.write_frame(&solid(4, 2, [0, 0, 0]))?;
        sink.write_frame(&solid(8, 4, [255, 255, 255]))?;
        sink.finish()?;
        sink.finish()?;

        let bytes = std::fs::read(&path)?;
        let header = b"YUV4MPEG2 W4 H2 F25:1 Ip A1:1 C444\n";
        assert!(bytes.starts_with(header));
        let frame_len = b"FRAME\n".len() + 4 * 2 * 3;
        assert_eq!(bytes.len(), header.len() + 2 * frame_len);
        assert_eq!(sink.frames_written(), 2);
        Ok(())
    }

    #[test]
    fn writing_after_finish_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = Y4mSink::create(&dir.path().join("a.y4m"), 10)?;
        sink.finish()?;
        assert!(sink.write_frame(&solid(2, 2, [1, 2, 3])).is_err());
        Ok(())
    }

    #[test]
    fn conversion_hits_studio_range_endpoints() {
        let mut out = Vec::new();
        rgb_to_yuv444(&[0, 0, 0, 255, 255, 255], &mut out);
        assert_eq!(out, vec![16, 235, 128, 128, 128, 128]);
    }
}
