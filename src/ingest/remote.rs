//! Remote clip source.
//!
//! A remote URL is downloaded to local storage once, synchronously, before
//! playback starts. The local file is then decoded like any other file.
//! Only a single clip is fetched: playlist expansion is disabled.
//!
//! Downloaded files are named `<download_dir>/<filename_stem>.<ext>`.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use url::Url;

use super::{FileSource, FramePull, FrameSource};
use crate::config::RemoteSettings;
use crate::error::SourceError;

/// Fetches a remote clip into `dest_dir` and returns the local path.
pub trait Downloader {
    fn name(&self) -> &'static str;

    fn download(&self, url: &Url, dest_dir: &Path, filename_stem: &str) -> Result<PathBuf>;
}

/// Pick the downloader named by `remote.downloader`.
pub fn downloader_for(settings: &RemoteSettings) -> Box<dyn Downloader> {
    match settings.downloader.as_str() {
        #[cfg(feature = "remote-http")]
        "http" => Box::new(HttpDownloader::default()),
        _ => Box::new(YtDlpDownloader::new(settings.program.clone())),
    }
}

/// Remote clip, played back from its downloaded copy.
pub struct RemoteSource {
    url: String,
    local_path: PathBuf,
    inner: FileSource,
}

impl RemoteSource {
    pub fn open(
        url: &str,
        downloader: &dyn Downloader,
        settings: &RemoteSettings,
    ) -> Result<Self, SourceError> {
        let parsed = Url::parse(url)
            .with_context(|| format!("invalid remote url '{}'", url))
            .map_err(|e| SourceError::download(url, e))?;
        let local_path = downloader
            .download(&parsed, &settings.download_dir, &settings.filename_stem)
            .map_err(|e| SourceError::download(url, e))?;
        log::info!(
            "RemoteSource: {} downloaded to {} via {}",
            url,
            local_path.display(),
            downloader.name()
        );

        let local = local_path.to_string_lossy().into_owned();
        let inner = FileSource::open(&local)?;
        Ok(Self {
            url: url.to_string(),
            local_path,
            inner,
        })
    }
}

impl FrameSource for RemoteSource {
    fn describe(&self) -> String {
        format!("{} ({})", self.url, self.local_path.display())
    }

    fn next_frame(&mut self) -> Result<FramePull> {
        self.inner.next_frame()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

// ----------------------------------------------------------------------------
// yt-dlp subprocess
// ----------------------------------------------------------------------------

/// Downloads through an external `yt-dlp` executable.
pub struct YtDlpDownloader {
    program: String,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Downloader for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn download(&self, url: &Url, dest_dir: &Path, filename_stem: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("create download dir {}", dest_dir.display()))?;
        let template = dest_dir.join(format!("{}.%(ext)s", filename_stem));
        let output = Command::new(&self.program)
            .arg("--format")
            .arg("best")
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--output")
            .arg(&template)
            .arg("--print")
            .arg("after_move:filepath")
            .arg(url.as_str())
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("{} did not report a downloaded file", self.program))?;
        if !path.is_file() {
            return Err(anyhow!(
                "{} reported {} but no file exists there",
                self.program,
                path.display()
            ));
        }
        Ok(path)
    }
}

// ----------------------------------------------------------------------------
// Direct HTTP download
// ----------------------------------------------------------------------------

/// Downloads a directly addressable clip over HTTP(S).
#[cfg(feature = "remote-http")]
#[derive(Default)]
pub struct HttpDownloader;

#[cfg(feature = "remote-http")]
impl Downloader for HttpDownloader {
    fn name(&self) -> &'static str {
        "http"
    }

    fn download(&self, url: &Url, dest_dir: &Path, filename_stem: &str) -> Result<PathBuf> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("http downloader cannot fetch {} urls", url.scheme()));
        }
        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("create download dir {}", dest_dir.display()))?;

        let response = ureq::get(url.as_str())
            .call()
            .with_context(|| format!("request {}", url))?;
        let path = dest_dir.join(format!("{}.{}", filename_stem, extension_for(url)));
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("create {}", path.display()))?;
        let bytes = std::io::copy(&mut response.into_reader(), &mut file)
            .with_context(|| format!("write {}", path.display()))?;
        if bytes == 0 {
            return Err(anyhow!("{} returned an empty body", url));
        }
        Ok(path)
    }
}

/// Extension of the last path segment, defaulting to `mp4`.
#[cfg_attr(not(feature = "remote-http"), allow(dead_code))]
fn extension_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubDownloader {
        result: std::result::Result<&'static str, &'static str>,
    }

    impl Downloader for StubDownloader {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn download(&self, _url: &Url, _dest_dir: &Path, _stem: &str) -> Result<PathBuf> {
            self.result.map(PathBuf::from).map_err(|e| anyhow!(e))
        }
    }

    fn settings() -> RemoteSettings {
        RemoteSettings::default()
    }

    #[test]
    fn downloaded_clip_plays_like_a_file() -> Result<()> {
        let downloader = StubDownloader {
            result: Ok("stub://clip?frames=2"),
        };
        let mut source = RemoteSource::open("https://videos.example/watch?v=1", &downloader, &settings())?;
        assert!(matches!(source.next_frame()?, FramePull::Frame(_)));
        assert_eq!(source.describe(), "https://videos.example/watch?v=1 (stub://clip?frames=2)");
        Ok(())
    }

    #[test]
    fn network_failure_is_a_download_error_with_cause() {
        let downloader = StubDownloader {
            result: Err("connection reset"),
        };
        let err = RemoteSource::open("https://videos.example/x", &downloader, &settings())
            .err()
            .expect("must fail");
        match err {
            SourceError::Download { url, cause } => {
                assert_eq!(url, "https://videos.example/x");
                assert_eq!(cause.to_string(), "connection reset");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_url_is_a_download_error() {
        let downloader = StubDownloader {
            result: Ok("stub://clip"),
        };
        assert!(matches!(
            RemoteSource::open("not a url", &downloader, &settings()),
            Err(SourceError::Download { .. })
        ));
    }

    #[test]
    fn missing_downloader_program_fails() {
        let downloader = YtDlpDownloader::new("/nonexistent/yt-dlp");
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("https://videos.example/x").unwrap();
        assert!(downloader.download(&url, dir.path(), "clip").is_err());
    }

    #[test]
    fn extension_defaults_to_mp4() {
        let url = Url::parse("https://cdn.example/media/clip.WEBM?sig=1").unwrap();
        assert_eq!(extension_for(&url), "webm");
        let url = Url::parse("https://cdn.example/watch").unwrap();
        assert_eq!(extension_for(&url), "mp4");
    }
}
