//! Error taxonomy surfaced to callers of the playback pipeline.
//!
//! - `SourceError`: a file, device, or remote clip could not be opened.
//! - `ModelLoadError`: the detector could not be constructed. Fatal at startup.
//! - `PlaybackError`: a command or tick could not complete.
//!
//! End of stream is not an error; it is reported as `FramePull::EndOfStream`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// File or device cannot be opened or decoded.
    #[error("source unavailable: {source_desc}")]
    Unavailable {
        source_desc: String,
        #[source]
        cause: anyhow::Error,
    },
    /// Network or extraction failure while fetching a remote clip.
    #[error("download failed for {url}")]
    Download {
        url: String,
        #[source]
        cause: anyhow::Error,
    },
}

impl SourceError {
    pub fn unavailable(source_desc: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Unavailable {
            source_desc: source_desc.into(),
            cause,
        }
    }

    pub fn download(url: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Download {
            url: url.into(),
            cause,
        }
    }
}

/// The detection model failed to load. The pipeline cannot run without it.
#[derive(Debug, Error)]
#[error("failed to load detector backend '{backend}'")]
pub struct ModelLoadError {
    pub backend: String,
    #[source]
    pub cause: anyhow::Error,
}

impl ModelLoadError {
    pub fn new(backend: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            backend: backend.into(),
            cause,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no source is open")]
    NoSourceOpen,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("output sink failed")]
    Sink(#[source] anyhow::Error),
    #[error("inference failed")]
    Inference(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::error::Error as _;

    #[test]
    fn download_error_keeps_cause() {
        let err = SourceError::download("https://example.com/clip", anyhow!("dns lookup failed"));
        assert_eq!(err.to_string(), "download failed for https://example.com/clip");
        let cause = err.source().map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("dns lookup failed"));
    }

    #[test]
    fn playback_error_wraps_source_transparently() {
        let err: PlaybackError =
            SourceError::unavailable("/tmp/missing.mp4", anyhow!("no such file")).into();
        assert_eq!(err.to_string(), "source unavailable: /tmp/missing.mp4");
    }
}
