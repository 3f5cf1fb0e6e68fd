//! player - Run object detection over a video source, headless.
//!
//! Opens one source, plays it through the detector at the configured fps and
//! logs the per-frame label counts. With `--save` the annotated frames are
//! recorded to a `.y4m` file. Ctrl-C pauses at the next frame boundary and
//! exits cleanly.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use detection_player::ui::Ui;
use detection_player::{
    summary_text, Command, Detector, LogDisplay, PlaybackController, PlayerConfig, Runner,
    SourceOpener, SourceSpec,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play a video source through an object detector")]
#[command(group(ArgGroup::new("source").required(true).args(["file", "device", "url"])))]
struct Args {
    /// Local video file (or a stub:// synthetic clip).
    #[arg(long)]
    file: Option<String>,

    /// Camera index, appended to the configured device root.
    #[arg(long)]
    device: Option<u32>,

    /// Remote clip URL, downloaded before playback starts.
    #[arg(long)]
    url: Option<String>,

    /// Record annotated frames to this .y4m file.
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,

    /// Minimum detection confidence in [0, 1].
    #[arg(long)]
    confidence: Option<f32>,

    /// NMS overlap threshold in [0, 1].
    #[arg(long)]
    overlap: Option<f32>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Terminal output: auto, plain or pretty.
    #[arg(long, env = "DETECTION_PLAYER_UI")]
    ui: Option<String>,
}

impl Args {
    fn source_spec(&self) -> Option<SourceSpec> {
        if let Some(path) = &self.file {
            return Some(SourceSpec::File(path.clone()));
        }
        if let Some(index) = self.device {
            return Some(SourceSpec::Device(index));
        }
        self.url.clone().map(SourceSpec::Remote)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PlayerConfig::load()?;
    if let Some(confidence) = args.confidence {
        config.confidence = confidence;
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap;
    }
    if let Some(path) = &args.save {
        config.output.save = true;
        config.output.path = Some(path.clone());
    }
    config.validate()?;

    let ui = Ui::from_flag(args.ui.as_deref());
    let detector = {
        let _stage = ui.stage(&format!("load {} detector", config.detector.backend));
        Detector::load(&config.detector)?
    };

    let opener = SourceOpener::new(config.devices.clone(), config.remote.clone(), ui.clone());
    let mut controller = PlaybackController::new(detector, opener, &config, LogDisplay);

    let source = args
        .source_spec()
        .context("one of --file, --device or --url is required")?;
    controller.dispatch(Command::Open {
        source,
        record_to: None,
    })?;
    controller.dispatch(Command::Play)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("error setting Ctrl-C handler")?;

    let runner = Runner::new(controller.fps(), &cancel).with_max_frames(args.max_frames);
    let summary = runner.run(&mut controller, &ui.frames(args.max_frames))?;
    log::info!("played {} frames ({:?})", summary.frames, summary.end);
    log::info!("{}", summary_text(controller.last_counts()));

    controller.dispatch(Command::Close)?;
    if let Some(path) = controller.last_recording() {
        log::info!("recording written to {}", path.display());
    }
    Ok(())
}
