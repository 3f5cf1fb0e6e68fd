//! Playback state machine.
//!
//! `PlaybackController` owns the open source, the optional output sink and
//! the detector. Front ends drive it with `Command`s and call `tick()` at the
//! playback cadence; every tick processes at most one frame.
//!
//! States:
//! - `Idle`: no source open
//! - `Ready`: source open, not advancing
//! - `Playing`: one frame per tick
//! - `Stopped`: source exhausted, failed, or closed
//!
//! Thresholds live in a shared `Thresholds` handle that may be written from
//! other threads. Each tick reads both values once, before pulling a frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::annotate::{annotate, count_labels, LabelCounts};
use crate::config::PlayerConfig;
use crate::detect::Detector;
use crate::display::DisplaySink;
use crate::error::PlaybackError;
use crate::frame::Viewport;
use crate::ingest::{FramePull, FrameSource, SourceOpener, SourceSpec};
use crate::sink::{OutputSink, SinkFactory, Y4mSinkFactory};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Ready,
    Playing,
    Stopped,
}

/// Snapshot of controller state for front ends.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub source_open: bool,
    pub saving_enabled: bool,
    pub confidence: f32,
    pub overlap: f32,
}

/// User-initiated controller inputs.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Close any current source and open a new one. `record_to` overrides the
    /// configured output path when saving is enabled.
    Open {
        source: SourceSpec,
        record_to: Option<PathBuf>,
    },
    Play,
    Pause,
    /// Applies from the next `Open` on.
    ToggleSave,
    SetConfidence(f32),
    SetOverlap(f32),
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    /// The source failed to produce a frame.
    DecodeFailed,
    /// `play()` after the source was already released.
    NoSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing was pulled.
    Skipped,
    Frame { index: u64, detections: usize },
    Stopped(StopReason),
}

// ----------------------------------------------------------------------------
// Thresholds
// ----------------------------------------------------------------------------

/// Live confidence and overlap thresholds, stored as `f32` bits.
#[derive(Clone, Debug)]
pub struct Thresholds {
    inner: Arc<ThresholdCells>,
}

#[derive(Debug)]
struct ThresholdCells {
    confidence: AtomicU32,
    overlap: AtomicU32,
}

impl Thresholds {
    pub fn new(confidence: f32, overlap: f32) -> Self {
        let thresholds = Self {
            inner: Arc::new(ThresholdCells {
                confidence: AtomicU32::new(0),
                overlap: AtomicU32::new(0),
            }),
        };
        thresholds.set_confidence(confidence);
        thresholds.set_overlap(overlap);
        thresholds
    }

    pub fn confidence(&self) -> f32 {
        f32::from_bits(self.inner.confidence.load(Ordering::Acquire))
    }

    pub fn overlap(&self) -> f32 {
        f32::from_bits(self.inner.overlap.load(Ordering::Acquire))
    }

    /// Values outside [0, 1] are clamped; NaN is ignored.
    pub fn set_confidence(&self, value: f32) {
        store_unit(&self.inner.confidence, value);
    }

    pub fn set_overlap(&self, value: f32) {
        store_unit(&self.inner.overlap, value);
    }

    /// `(confidence, overlap)` as read at one point in time.
    pub fn snapshot(&self) -> (f32, f32) {
        (self.confidence(), self.overlap())
    }
}

fn store_unit(cell: &AtomicU32, value: f32) {
    if value.is_nan() {
        log::warn!("ignoring NaN threshold");
        return;
    }
    cell.store(value.clamp(0.0, 1.0).to_bits(), Ordering::Release);
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

pub struct PlaybackController<D: DisplaySink> {
    detector: Detector,
    opener: SourceOpener,
    sinks: Box<dyn SinkFactory>,
    display: D,
    thresholds: Thresholds,
    viewport: Viewport,
    fps: u32,
    autoplay: bool,
    default_output: Option<PathBuf>,

    status: PlaybackStatus,
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn OutputSink>>,
    saving_enabled: bool,
    last_counts: LabelCounts,
    last_recording: Option<PathBuf>,
}

impl<D: DisplaySink> PlaybackController<D> {
    pub fn new(detector: Detector, opener: SourceOpener, config: &PlayerConfig, display: D) -> Self {
        Self {
            detector,
            opener,
            sinks: Box::new(Y4mSinkFactory),
            display,
            thresholds: Thresholds::new(config.confidence, config.overlap),
            viewport: config.viewport,
            fps: config.playback.fps,
            autoplay: config.playback.autoplay,
            default_output: config.output.path.clone(),
            status: PlaybackStatus::Idle,
            source: None,
            sink: None,
            saving_enabled: config.output.save,
            last_counts: LabelCounts::default(),
            last_recording: None,
        }
    }

    pub fn with_sink_factory(mut self, sinks: Box<dyn SinkFactory>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn state(&self) -> PlaybackState {
        let (confidence, overlap) = self.thresholds.snapshot();
        PlaybackState {
            status: self.status,
            is_playing: self.status == PlaybackStatus::Playing,
            source_open: self.source.is_some(),
            saving_enabled: self.saving_enabled,
            confidence,
            overlap,
        }
    }

    /// Shared handle; writes are picked up at the next tick.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds.clone()
    }

    /// Counts published by the most recent processed frame.
    pub fn last_counts(&self) -> &LabelCounts {
        &self.last_counts
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Path of the active recording, if any.
    pub fn recording(&self) -> Option<PathBuf> {
        self.sink.as_ref().map(|sink| sink.path().to_path_buf())
    }

    /// Path of the most recently finished recording. Cleared by the next open.
    pub fn last_recording(&self) -> Option<&Path> {
        self.last_recording.as_deref()
    }

    pub fn dispatch(&mut self, command: Command) -> Result<(), PlaybackError> {
        log::debug!("command {:?} in {:?}", command, self.status);
        match command {
            Command::Open { source, record_to } => self.open(&source, record_to),
            Command::Play => self.play(),
            Command::Pause => {
                self.pause();
                Ok(())
            }
            Command::ToggleSave => {
                self.saving_enabled = !self.saving_enabled;
                log::info!(
                    "saving {} from the next opened source",
                    if self.saving_enabled { "enabled" } else { "disabled" }
                );
                Ok(())
            }
            Command::SetConfidence(value) => {
                self.thresholds.set_confidence(value);
                Ok(())
            }
            Command::SetOverlap(value) => {
                self.thresholds.set_overlap(value);
                Ok(())
            }
            Command::Close => {
                self.close();
                Ok(())
            }
        }
    }

    pub fn open(&mut self, target: &SourceSpec, record_to: Option<PathBuf>) -> Result<(), PlaybackError> {
        self.release();
        self.transition(PlaybackStatus::Idle);
        self.last_counts = LabelCounts::default();
        self.last_recording = None;

        let mut source = match self.opener.open(target) {
            Ok(source) => source,
            Err(err) => {
                log::warn!("open {} failed: {}", target, err);
                return Err(err.into());
            }
        };

        if self.saving_enabled {
            match record_to.or_else(|| self.default_output.clone()) {
                Some(path) => match self.sinks.create(&path, self.fps) {
                    Ok(sink) => self.sink = Some(sink),
                    Err(err) => {
                        source.close();
                        return Err(PlaybackError::Sink(err));
                    }
                },
                None => log::warn!("saving is enabled but no output path was given"),
            }
        }

        log::info!("opened {}", source.describe());
        self.source = Some(source);
        self.transition(PlaybackStatus::Ready);
        if self.autoplay {
            self.transition(PlaybackStatus::Playing);
        }
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        match self.status {
            PlaybackStatus::Idle => Err(PlaybackError::NoSourceOpen),
            PlaybackStatus::Ready | PlaybackStatus::Stopped => {
                self.transition(PlaybackStatus::Playing);
                Ok(())
            }
            PlaybackStatus::Playing => Ok(()),
        }
    }

    pub fn pause(&mut self) {
        if self.status == PlaybackStatus::Playing {
            self.transition(PlaybackStatus::Ready);
        }
    }

    /// Release the source and finish the recording.
    pub fn close(&mut self) {
        if self.status != PlaybackStatus::Idle {
            self.release();
            self.transition(PlaybackStatus::Stopped);
        }
    }

    /// Process one frame if playing.
    pub fn tick(&mut self) -> Result<TickOutcome, PlaybackError> {
        if self.status != PlaybackStatus::Playing {
            return Ok(TickOutcome::Skipped);
        }
        let (confidence, overlap) = self.thresholds.snapshot();

        let Some(source) = self.source.as_mut() else {
            self.stop();
            return Ok(TickOutcome::Stopped(StopReason::NoSource));
        };
        let frame = match source.next_frame() {
            Ok(FramePull::Frame(frame)) => frame,
            Ok(FramePull::EndOfStream) => {
                log::info!("{}: end of stream", source.describe());
                self.stop();
                return Ok(TickOutcome::Stopped(StopReason::EndOfStream));
            }
            Err(err) => {
                log::warn!("{}: frame decode failed, stopping: {:#}", source.describe(), err);
                self.stop();
                return Ok(TickOutcome::Stopped(StopReason::DecodeFailed));
            }
        };

        let started = std::time::Instant::now();
        let frame = frame.resize_to_fit(self.viewport);
        let detections = match self.detector.detect(&frame, confidence, overlap) {
            Ok(detections) => detections,
            Err(err) => {
                self.stop();
                return Err(PlaybackError::Inference(err));
            }
        };
        let annotated = annotate(&frame, &detections);
        let counts = count_labels(&detections);

        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.write_frame(&annotated) {
                self.stop();
                return Err(PlaybackError::Sink(err));
            }
        }

        self.display.publish(&annotated, &counts);
        log::debug!(
            "frame {}: {} detections in {:?}",
            annotated.index(),
            detections.len(),
            started.elapsed()
        );
        let outcome = TickOutcome::Frame {
            index: annotated.index(),
            detections: detections.len(),
        };
        self.last_counts = counts;
        Ok(outcome)
    }

    fn transition(&mut self, next: PlaybackStatus) {
        if self.status != next {
            log::info!("playback {:?} -> {:?}", self.status, next);
            self.status = next;
        }
    }

    fn stop(&mut self) {
        self.release();
        self.transition(PlaybackStatus::Stopped);
    }

    fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.finish() {
                log::warn!("failed to finish recording {}: {:#}", sink.path().display(), err);
            }
            self.last_recording = Some(sink.path().to_path_buf());
        }
    }
}

impl<D: DisplaySink> Drop for PlaybackController<D> {
    fn drop(&mut self) {
        self.release();
    }
}
