use anyhow::{anyhow, Result};
use std::path::Path;

use detection_player::config::{DeviceSettings, RemoteSettings};
use detection_player::detect::StubBackend;
use detection_player::ui::Ui;
use detection_player::{
    count_labels, BoundingBox, Command, Detection, Detector, DetectorBackend, DisplaySink, Frame,
    LabelCounts, OutputSink, PlaybackController, PlaybackError, PlaybackStatus, PlayerConfig,
    SinkFactory, SourceOpener, SourceSpec, StopReason, TickOutcome,
};

/// Frame N yields N disjoint `person` boxes at confidence 0.9, plus one
/// `dog` at 0.3 that only survives a lowered confidence threshold.
struct CountingBackend;

impl DetectorBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut detections: Vec<Detection> = (0..frame.index())
            .map(|k| {
                let x = k as f32 * 20.0;
                Detection::new("person", 0.9, BoundingBox::new(x, 0.0, x + 10.0, 10.0))
            })
            .collect();
        detections.push(Detection::new(
            "dog",
            0.3,
            BoundingBox::new(0.0, 100.0, 10.0, 110.0),
        ));
        Ok(detections)
    }
}

/// Two `car` boxes with IoU 0.9.
struct DuplicateBackend;

impl DetectorBackend for DuplicateBackend {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(vec![
            Detection::new("car", 0.8, BoundingBox::new(0.0, 0.0, 100.0, 100.0)),
            Detection::new("car", 0.95, BoundingBox::new(0.0, 0.0, 100.0, 90.0)),
        ])
    }
}

#[derive(Default)]
struct Recorded {
    frames: Vec<(u64, usize)>,
}

impl DisplaySink for Recorded {
    fn publish(&mut self, frame: &Frame, counts: &LabelCounts) {
        self.frames.push((frame.index(), counts.total()));
    }
}

fn controller_with(
    backend: Box<dyn DetectorBackend>,
    config: &PlayerConfig,
) -> PlaybackController<Recorded> {
    let opener = SourceOpener::new(DeviceSettings::default(), RemoteSettings::default(), Ui::plain());
    PlaybackController::new(Detector::new(backend), opener, config, Recorded::default())
}

fn clip(query: &str) -> SourceSpec {
    SourceSpec::File(format!("stub://clip?{}", query))
}

#[test]
fn corrupt_frame_stops_playback_and_keeps_previous_counts() {
    let mut ctl = controller_with(Box::new(CountingBackend), &PlayerConfig::default());
    ctl.dispatch(Command::Open {
        source: clip("frames=10&corrupt=5"),
        record_to: None,
    })
    .unwrap();
    ctl.dispatch(Command::Play).unwrap();

    for expected in 1..=4u64 {
        assert_eq!(
            ctl.tick().unwrap(),
            TickOutcome::Frame {
                index: expected,
                detections: expected as usize,
            }
        );
    }
    assert_eq!(
        ctl.tick().unwrap(),
        TickOutcome::Stopped(StopReason::DecodeFailed)
    );
    assert_eq!(ctl.status(), PlaybackStatus::Stopped);

    assert_eq!(ctl.last_counts().get("person"), 4);
    assert_eq!(ctl.last_counts().total(), 4);
    assert_eq!(
        ctl.display().frames,
        vec![(1, 1), (2, 2), (3, 3), (4, 4)]
    );
    assert_eq!(ctl.tick().unwrap(), TickOutcome::Skipped);
}

#[test]
fn duplicate_boxes_collapse_to_the_most_confident() {
    let mut detector = Detector::new(Box::new(DuplicateBackend));
    let frame = Frame::from_rgb(4, 4, vec![0; 4 * 4 * 3]).unwrap();
    let kept = detector.detect(&frame, 0.5, 0.45).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].confidence, 0.95);

    let mut ctl = controller_with(Box::new(DuplicateBackend), &PlayerConfig::default());
    ctl.open(&clip("frames=1"), None).unwrap();
    ctl.play().unwrap();
    assert!(matches!(
        ctl.tick().unwrap(),
        TickOutcome::Frame { detections: 1, .. }
    ));
    assert_eq!(ctl.last_counts().get("car"), 1);
}

#[test]
fn threshold_changes_apply_from_the_next_tick() {
    let mut ctl = controller_with(Box::new(CountingBackend), &PlayerConfig::default());
    let thresholds = ctl.thresholds();
    ctl.open(&clip("frames=3"), None).unwrap();
    ctl.play().unwrap();

    ctl.tick().unwrap();
    assert_eq!(ctl.last_counts().get("dog"), 0);

    thresholds.set_confidence(0.25);
    ctl.tick().unwrap();
    assert_eq!(ctl.last_counts().get("dog"), 1);
    assert_eq!(ctl.state().confidence, 0.25);

    ctl.dispatch(Command::SetConfidence(0.95)).unwrap();
    ctl.tick().unwrap();
    assert!(ctl.last_counts().is_empty());
}

#[test]
fn play_without_a_source_is_rejected() {
    let mut ctl = controller_with(Box::new(CountingBackend), &PlayerConfig::default());
    let err = ctl.dispatch(Command::Play).unwrap_err();
    assert!(matches!(err, PlaybackError::NoSourceOpen));
    assert_eq!(ctl.status(), PlaybackStatus::Idle);
    assert!(!ctl.state().is_playing);
}

#[test]
fn save_toggle_waits_for_the_next_open() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.y4m");
    let second = dir.path().join("second.y4m");

    let mut ctl = controller_with(Box::new(CountingBackend), &PlayerConfig::default());
    ctl.dispatch(Command::Open {
        source: clip("frames=10"),
        record_to: Some(first.clone()),
    })
    .unwrap();
    ctl.dispatch(Command::Play).unwrap();
    ctl.tick().unwrap();

    ctl.dispatch(Command::ToggleSave).unwrap();
    assert!(ctl.state().saving_enabled);
    ctl.tick().unwrap();
    assert!(!first.exists());
    assert!(ctl.recording().is_none());

    ctl.dispatch(Command::Open {
        source: clip("frames=2"),
        record_to: Some(second.clone()),
    })
    .unwrap();
    assert_eq!(ctl.status(), PlaybackStatus::Ready);
    assert!(second.exists());
    assert_eq!(ctl.recording().as_deref(), Some(second.as_path()));

    ctl.dispatch(Command::Play).unwrap();
    while let TickOutcome::Frame { .. } = ctl.tick().unwrap() {}
    assert_eq!(ctl.status(), PlaybackStatus::Stopped);
    assert!(ctl.recording().is_none());
    assert_eq!(ctl.last_recording(), Some(second.as_path()));
    assert!(!first.exists());
    assert_y4m_frames(&second, 2);
}

#[test]
fn opening_a_new_source_replaces_the_old_one() {
    let mut ctl = controller_with(Box::new(CountingBackend), &PlayerConfig::default());
    ctl.open(&clip("frames=10"), None).unwrap();
    ctl.play().unwrap();
    ctl.tick().unwrap();
    ctl.tick().unwrap();

    ctl.open(&clip("frames=10"), None).unwrap();
    assert_eq!(ctl.status(), PlaybackStatus::Ready);
    assert!(ctl.last_counts().is_empty());
    ctl.play().unwrap();
    assert!(matches!(ctl.tick().unwrap(), TickOutcome::Frame { index: 1, .. }));
}

#[test]
fn stub_detector_is_deterministic() {
    let labels = vec!["person".to_string(), "car".to_string(), "dog".to_string()];
    let mut detector = Detector::new(Box::new(StubBackend::new(labels).unwrap()));
    let pixels = (0..64u32 * 48 * 3).map(|i| (i % 251) as u8).collect();
    let frame = Frame::from_rgb(64, 48, pixels).unwrap();

    let first = detector.detect(&frame, 0.2, 0.45).unwrap();
    let second = detector.detect(&frame, 0.2, 0.45).unwrap();
    assert_eq!(first, second);
    assert_eq!(count_labels(&first).total(), first.len());
}

struct ReadOnlyDisk;

impl SinkFactory for ReadOnlyDisk {
    fn create(&self, path: &Path, _fps: u32) -> Result<Box<dyn OutputSink>> {
        Err(anyhow!("{} is on a read-only disk", path.display()))
    }
}

#[test]
fn sink_creation_failure_is_reported_and_source_released() {
    let mut config = PlayerConfig::default();
    config.output.save = true;
    config.output.path = Some("/recordings/session.y4m".into());
    let mut ctl = controller_with(Box::new(CountingBackend), &config)
        .with_sink_factory(Box::new(ReadOnlyDisk));

    let err = ctl.open(&clip("frames=3"), None).unwrap_err();
    assert!(matches!(err, PlaybackError::Sink(_)));
    assert_eq!(ctl.status(), PlaybackStatus::Idle);
    assert!(!ctl.state().source_open);
}

fn assert_y4m_frames(path: &Path, frames: usize) {
    let bytes = std::fs::read(path).unwrap();
    let header_end = bytes.iter().position(|b| *b == b'\n').unwrap() + 1;
    let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
    assert!(header.starts_with("YUV4MPEG2 "), "{header}");
    assert!(header.trim_end().ends_with("C444"), "{header}");
    let markers = bytes
        .windows(6)
        .filter(|window| *window == b"FRAME\n")
        .count();
    assert!(markers >= frames);
}
