use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::frame::Viewport;

const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_OVERLAP: f32 = 0.45;
const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;
const DEFAULT_FPS: u32 = 25;
const DEFAULT_DOWNLOADER: &str = "yt-dlp";
const DEFAULT_DOWNLOAD_DIR: &str = ".";
const DEFAULT_FILENAME_STEM: &str = "downloaded_video";
const DEFAULT_DEVICE_ROOT: &str = "/dev/video";
const DEFAULT_MAX_PROBE: u32 = 10;
const DEFAULT_DEVICE_WIDTH: u32 = 640;
const DEFAULT_DEVICE_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct PlayerConfigFile {
    detector: Option<DetectorConfigFile>,
    thresholds: Option<ThresholdConfigFile>,
    viewport: Option<ViewportConfigFile>,
    playback: Option<PlaybackConfigFile>,
    output: Option<OutputConfigFile>,
    remote: Option<RemoteConfigFile>,
    devices: Option<DeviceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels: Option<PathBuf>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    confidence: Option<f32>,
    overlap: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ViewportConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PlaybackConfigFile {
    fps: Option<u32>,
    autoplay: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    save: Option<bool>,
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RemoteConfigFile {
    downloader: Option<String>,
    program: Option<String>,
    download_dir: Option<PathBuf>,
    filename_stem: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    root: Option<String>,
    max_probe: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

/// Fully resolved player configuration.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub detector: DetectorSettings,
    pub confidence: f32,
    pub overlap: f32,
    pub viewport: Viewport,
    pub playback: PlaybackSettings,
    pub output: OutputSettings,
    pub remote: RemoteSettings,
    pub devices: DeviceSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// `stub` or `tract`.
    pub backend: String,
    pub model_path: Option<PathBuf>,
    /// Newline separated class names. The built-in COCO list when unset.
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub fps: u32,
    pub autoplay: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OutputSettings {
    pub save: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// `yt-dlp` or `http`.
    pub downloader: String,
    pub program: String,
    pub download_dir: PathBuf,
    pub filename_stem: String,
}

#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub root: String,
    pub max_probe: u32,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            autoplay: false,
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            downloader: DEFAULT_DOWNLOADER.to_string(),
            program: DEFAULT_DOWNLOADER.to_string(),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            filename_stem: DEFAULT_FILENAME_STEM.to_string(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            root: DEFAULT_DEVICE_ROOT.to_string(),
            max_probe: DEFAULT_MAX_PROBE,
            width: DEFAULT_DEVICE_WIDTH,
            height: DEFAULT_DEVICE_HEIGHT,
            target_fps: DEFAULT_FPS,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorSettings::default(),
            confidence: DEFAULT_CONFIDENCE,
            overlap: DEFAULT_OVERLAP,
            viewport: Viewport::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT),
            playback: PlaybackSettings::default(),
            output: OutputSettings::default(),
            remote: RemoteSettings::default(),
            devices: DeviceSettings::default(),
        }
    }
}

impl PlayerConfig {
    /// Defaults, then the file named by `DETECTION_PLAYER_CONFIG`, then
    /// `DETECTION_PLAYER_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECTION_PLAYER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file and validate it, ignoring the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path)?);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PlayerConfigFile) -> Self {
        let defaults = Self::default();

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file.backend.unwrap_or(defaults.detector.backend),
            model_path: detector_file.model_path,
            labels_path: detector_file.labels,
            input_size: detector_file
                .input_size
                .unwrap_or(defaults.detector.input_size),
        };

        let thresholds = file.thresholds.unwrap_or_default();
        let viewport_file = file.viewport.unwrap_or_default();
        let viewport = Viewport::new(
            viewport_file.width.unwrap_or(defaults.viewport.width),
            viewport_file.height.unwrap_or(defaults.viewport.height),
        );

        let playback_file = file.playback.unwrap_or_default();
        let playback = PlaybackSettings {
            fps: playback_file.fps.unwrap_or(defaults.playback.fps),
            autoplay: playback_file.autoplay.unwrap_or(defaults.playback.autoplay),
        };

        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            save: output_file.save.unwrap_or(false),
            path: output_file.path,
        };

        let remote_file = file.remote.unwrap_or_default();
        let remote = RemoteSettings {
            downloader: remote_file
                .downloader
                .unwrap_or(defaults.remote.downloader),
            program: remote_file.program.unwrap_or(defaults.remote.program),
            download_dir: remote_file
                .download_dir
                .unwrap_or(defaults.remote.download_dir),
            filename_stem: remote_file
                .filename_stem
                .unwrap_or(defaults.remote.filename_stem),
        };

        let device_file = file.devices.unwrap_or_default();
        let devices = DeviceSettings {
            root: device_file.root.unwrap_or(defaults.devices.root),
            max_probe: device_file.max_probe.unwrap_or(defaults.devices.max_probe),
            width: device_file.width.unwrap_or(defaults.devices.width),
            height: device_file.height.unwrap_or(defaults.devices.height),
            target_fps: device_file
                .target_fps
                .unwrap_or(defaults.devices.target_fps),
        };

        Self {
            detector,
            confidence: thresholds.confidence.unwrap_or(defaults.confidence),
            overlap: thresholds.overlap.unwrap_or(defaults.overlap),
            viewport,
            playback,
            output,
            remote,
            devices,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(backend) = non_empty_env("DETECTION_PLAYER_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(model) = non_empty_env("DETECTION_PLAYER_MODEL") {
            self.detector.model_path = Some(PathBuf::from(model));
        }
        if let Some(value) = non_empty_env("DETECTION_PLAYER_CONFIDENCE") {
            self.confidence = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETECTION_PLAYER_CONFIDENCE must be a number"))?;
        }
        if let Some(value) = non_empty_env("DETECTION_PLAYER_OVERLAP") {
            self.overlap = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETECTION_PLAYER_OVERLAP must be a number"))?;
        }
        if let Some(value) = non_empty_env("DETECTION_PLAYER_FPS") {
            self.playback.fps = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETECTION_PLAYER_FPS must be a positive integer"))?;
        }
        if let Some(path) = non_empty_env("DETECTION_PLAYER_OUTPUT") {
            self.output.path = Some(PathBuf::from(path));
            self.output.save = true;
        }
        if let Some(root) = non_empty_env("DETECTION_PLAYER_DEVICE_ROOT") {
            self.devices.root = root;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "thresholds.confidence must be within [0, 1], got {}",
                self.confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.overlap) {
            return Err(anyhow!(
                "thresholds.overlap must be within [0, 1], got {}",
                self.overlap
            ));
        }
        if self.playback.fps == 0 {
            return Err(anyhow!("playback.fps must be greater than zero"));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(anyhow!("viewport.width and viewport.height must be non-zero"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        match self.detector.backend.as_str() {
            "stub" => {}
            "tract" => {
                if self.detector.model_path.is_none() {
                    return Err(anyhow!("detector.model_path is required for the tract backend"));
                }
            }
            other => return Err(anyhow!("detector.backend '{}' is not supported", other)),
        }
        if self.output.save && self.output.path.is_none() {
            return Err(anyhow!("output.path is required when output.save is enabled"));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PlayerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
