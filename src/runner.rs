//! Fixed-cadence driver for `PlaybackController`.
//!
//! One tick per frame interval on the calling thread. A tick that overruns
//! the interval delays the next one; frames are never skipped to catch up.
//! The cancel flag is checked at the top of each tick, never mid-frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::display::DisplaySink;
use crate::error::PlaybackError;
use crate::playback::{Command, PlaybackController, PlaybackStatus, TickOutcome};
use crate::ui::FrameProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunEnd {
    /// Source stopped (end of stream, decode failure, or closed).
    Stopped,
    /// Cancel flag observed; playback was paused.
    Cancelled,
    /// `max_frames` processed; playback was paused.
    FrameLimit,
    /// Controller was not playing when the loop started, or left `Playing`
    /// without stopping.
    NotPlaying,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub end: RunEnd,
}

pub struct Runner<'a> {
    interval: Duration,
    max_frames: Option<u64>,
    cancel: &'a AtomicBool,
}

impl<'a> Runner<'a> {
    pub fn new(fps: u32, cancel: &'a AtomicBool) -> Self {
        Self {
            interval: frame_interval(fps),
            max_frames: None,
            cancel,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick until the controller leaves `Playing`, the cancel flag is raised,
    /// or the frame limit is reached.
    ///
    /// The progress display is finished on every exit, errors included.
    pub fn run<D: DisplaySink>(
        &self,
        controller: &mut PlaybackController<D>,
        progress: &FrameProgress,
    ) -> Result<RunSummary, PlaybackError> {
        let mut frames = 0u64;
        let end = self.drive(controller, progress, &mut frames);
        progress.finish();
        Ok(RunSummary { frames, end: end? })
    }

    fn drive<D: DisplaySink>(
        &self,
        controller: &mut PlaybackController<D>,
        progress: &FrameProgress,
        frames: &mut u64,
    ) -> Result<RunEnd, PlaybackError> {
        if controller.status() != PlaybackStatus::Playing {
            return Ok(RunEnd::NotPlaying);
        }

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                controller.dispatch(Command::Pause)?;
                return Ok(RunEnd::Cancelled);
            }
            if self.max_frames.is_some_and(|limit| *frames >= limit) {
                controller.dispatch(Command::Pause)?;
                return Ok(RunEnd::FrameLimit);
            }

            let started = Instant::now();
            match controller.tick()? {
                TickOutcome::Frame { .. } => {
                    *frames += 1;
                    progress.advance(&controller.last_counts().summary_lines().join(", "));
                }
                TickOutcome::Stopped(reason) => {
                    log::info!("playback stopped after {} frames ({:?})", frames, reason);
                    return Ok(RunEnd::Stopped);
                }
                TickOutcome::Skipped => return Ok(RunEnd::NotPlaying),
            }
            std::thread::sleep(self.interval.saturating_sub(started.elapsed()));
        }
    }
}

fn frame_interval(fps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::LabelCounts;
    use crate::config::{DeviceSettings, PlayerConfig, RemoteSettings};
    use crate::detect::{Detection, Detector, DetectorBackend, StubBackend};
    use crate::display::LatestFrame;
    use crate::frame::Frame;
    use crate::ingest::{SourceOpener, SourceSpec};
    use crate::ui::{Ui, UiMode};

    /// Sleeps `delay` per frame, then reports nothing.
    struct SlowBackend {
        delay: Duration,
    }

    impl DetectorBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            std::thread::sleep(self.delay);
            Ok(Vec::new())
        }
    }

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            Err(anyhow::anyhow!("model crashed"))
        }
    }

    #[derive(Default)]
    struct Indices(Vec<u64>);

    impl DisplaySink for Indices {
        fn publish(&mut self, frame: &Frame, _counts: &LabelCounts) {
            self.0.push(frame.index());
        }
    }

    fn playing_with<D: DisplaySink>(
        backend: Box<dyn DetectorBackend>,
        display: D,
        query: &str,
    ) -> PlaybackController<D> {
        let opener = SourceOpener::new(DeviceSettings::default(), RemoteSettings::default(), Ui::plain());
        let mut ctl = PlaybackController::new(Detector::new(backend), opener, &PlayerConfig::default(), display);
        ctl.open(&SourceSpec::File(format!("stub://clip?{}", query)), None)
            .unwrap();
        ctl.play().unwrap();
        ctl
    }

    fn playing(query: &str) -> PlaybackController<LatestFrame> {
        let backend = StubBackend::new(vec!["cat".to_string()]).unwrap();
        playing_with(Box::new(backend), LatestFrame::default(), query)
    }

    #[test]
    fn interval_follows_fps() {
        assert_eq!(frame_interval(25), Duration::from_millis(40));
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn runs_finite_clip_to_the_end() {
        let cancel = AtomicBool::new(false);
        let mut ctl = playing("frames=4");
        let summary = Runner::new(1000, &cancel)
            .run(&mut ctl, &Ui::plain().frames(None))
            .unwrap();
        assert_eq!(summary, RunSummary { frames: 4, end: RunEnd::Stopped });
        assert_eq!(ctl.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn frame_limit_pauses() {
        let cancel = AtomicBool::new(false);
        let mut ctl = playing("frames=10");
        let summary = Runner::new(1000, &cancel)
            .with_max_frames(Some(3))
            .run(&mut ctl, &Ui::plain().frames(Some(3)))
            .unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.end, RunEnd::FrameLimit);
        assert_eq!(ctl.status(), PlaybackStatus::Ready);
    }

    #[test]
    fn cancel_flag_pauses_before_the_next_frame() {
        let cancel = AtomicBool::new(true);
        let mut ctl = playing("frames=10");
        let summary = Runner::new(1000, &cancel)
            .run(&mut ctl, &Ui::plain().frames(None))
            .unwrap();
        assert_eq!(summary, RunSummary { frames: 0, end: RunEnd::Cancelled });
        assert_eq!(ctl.status(), PlaybackStatus::Ready);
    }

    #[test]
    fn overrunning_ticks_delay_but_never_skip_frames() {
        let cancel = AtomicBool::new(false);
        let slow = SlowBackend {
            delay: Duration::from_millis(15),
        };
        let mut ctl = playing_with(Box::new(slow), Indices::default(), "frames=6");
        let runner = Runner::new(1000, &cancel);
        assert!(runner.interval() < Duration::from_millis(15));

        let started = Instant::now();
        let summary = runner.run(&mut ctl, &Ui::plain().frames(None)).unwrap();
        assert_eq!(summary, RunSummary { frames: 6, end: RunEnd::Stopped });
        assert_eq!(ctl.display().0, vec![1, 2, 3, 4, 5, 6]);
        assert!(started.elapsed() >= Duration::from_millis(6 * 15));
    }

    #[test]
    fn not_playing_after_open_reports_not_playing() {
        let cancel = AtomicBool::new(false);
        let mut ctl = playing("frames=3");
        ctl.pause();
        let summary = Runner::new(1000, &cancel)
            .run(&mut ctl, &Ui::plain().frames(None))
            .unwrap();
        assert_eq!(summary, RunSummary { frames: 0, end: RunEnd::NotPlaying });
        assert_eq!(ctl.status(), PlaybackStatus::Ready);
    }

    #[test]
    fn inference_error_still_finishes_progress() {
        let cancel = AtomicBool::new(false);
        let mut ctl = playing_with(Box::new(FailingBackend), LatestFrame::default(), "frames=3");
        let progress = Ui::new(UiMode::Pretty, true).frames(Some(3));
        let err = Runner::new(1000, &cancel).run(&mut ctl, &progress).unwrap_err();
        assert!(matches!(err, PlaybackError::Inference(_)));
        assert!(progress.is_finished());
        assert_eq!(ctl.status(), PlaybackStatus::Stopped);
    }
}
