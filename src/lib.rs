//! Detection Player
//!
//! Plays video from a file, a camera, or a downloaded clip through an object
//! detector, draws the detections onto each frame and publishes the annotated
//! frame plus per-frame label counts to a display.
//!
//! # Pipeline
//!
//! ```text
//! FrameSource -> PlaybackController -> Detector -> annotate -> {DisplaySink, OutputSink}
//! ```
//!
//! Playback is single threaded. `PlaybackController` processes at most one
//! frame per `tick()`; `Runner` calls it at a fixed cadence. Threshold changes
//! go through a shared `Thresholds` handle and apply from the next tick.
//!
//! # Module Structure
//!
//! - `frame`: immutable RGB frames and viewport fitting
//! - `ingest`: file, camera and remote sources (`stub://` for synthetic ones)
//! - `detect`: detector backends, confidence filtering, NMS
//! - `annotate`: box and label overlay, label counts
//! - `playback`: the state machine and its commands
//! - `sink`: YUV4MPEG2 recording of annotated frames
//! - `display`: presentation collaborator and summary text
//! - `config`: file and environment configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
mod font;
pub mod frame;
pub mod ingest;
pub mod playback;
pub mod runner;
pub mod sink;
pub mod ui;

pub use annotate::{annotate, count_labels, LabelCounts};
pub use config::PlayerConfig;
pub use detect::{BoundingBox, Detection, Detector, DetectorBackend};
pub use display::{summary_text, DisplaySink, LatestFrame, LogDisplay};
pub use error::{ModelLoadError, PlaybackError, SourceError};
pub use frame::{Frame, Viewport};
pub use ingest::{probe_devices, DeviceId, FramePull, FrameSource, SourceOpener, SourceSpec};
pub use playback::{
    Command, PlaybackController, PlaybackState, PlaybackStatus, StopReason, Thresholds,
    TickOutcome,
};
pub use runner::{RunEnd, RunSummary, Runner};
pub use sink::{OutputSink, SinkFactory, Y4mSink, Y4mSinkFactory};
