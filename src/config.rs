use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CameraConfig;
use crate::detect::EngineKind;
use crate::watch::{WatchParams, DEFAULT_ATTEMPTS, DEFAULT_DURATION, DEFAULT_INTERVAL};

const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_FPS: u32 = 15;
const DEFAULT_WARMUP_FRAMES: u32 = 5;
const DEFAULT_BACKEND: EngineKind = EngineKind::Tract;
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    output_dir: Option<PathBuf>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    watch: Option<LoopConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    warmup_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    annotate: Option<bool>,
    script: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize, Default)]
struct LoopConfigFile {
    interval_secs: Option<f64>,
    duration_secs: Option<f64>,
    attempts: Option<u32>,
    repeat: Option<bool>,
    preview: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub output_dir: PathBuf,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub watch: WatchParams,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub warmup_frames: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: EngineKind,
    pub model_path: PathBuf,
    /// Square model input edge in pixels.
    pub input_size: u32,
    pub annotate: bool,
    /// Person counts replayed by the stub engine.
    pub script: Vec<u32>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            annotate: true,
            script: Vec::new(),
        }
    }
}

impl WatchConfig {
    /// Load from `WATCHCAM_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WATCHCAM_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit config file (if any), then environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera.device.clone(),
            width: self.camera.width,
            height: self.camera.height,
            fps: self.camera.fps,
            warmup_frames: self.camera.warmup_frames,
            output_dir: self.output_dir.clone(),
        }
    }

    fn from_file(file: WatchConfigFile) -> Result<Self> {
        let output_dir = file
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_HEIGHT),
            fps: camera_file.fps.unwrap_or(DEFAULT_FPS),
            warmup_frames: camera_file.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
        };
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: match detector_file.backend {
                Some(name) => name.parse()?,
                None => DEFAULT_BACKEND,
            },
            model_path: detector_file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            annotate: detector_file.annotate.unwrap_or(true),
            script: detector_file.script.unwrap_or_default(),
        };
        let loop_file = file.watch.unwrap_or_default();
        let watch = WatchParams {
            interval: match loop_file.interval_secs {
                Some(secs) => seconds("watch.interval_secs", secs)?,
                None => DEFAULT_INTERVAL,
            },
            duration: match loop_file.duration_secs {
                Some(secs) => seconds("watch.duration_secs", secs)?,
                None => DEFAULT_DURATION,
            },
            attempts: loop_file.attempts.unwrap_or(DEFAULT_ATTEMPTS),
            repeat: loop_file.repeat.unwrap_or(true),
            preview: loop_file.preview.unwrap_or(false),
        };
        Ok(Self {
            output_dir,
            camera,
            detector,
            watch,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = non_empty_env("WATCHCAM_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(device) = non_empty_env("WATCHCAM_DEVICE") {
            self.camera.device = device;
        }
        if let Some(backend) = non_empty_env("WATCHCAM_BACKEND") {
            self.detector.backend = backend.parse()?;
        }
        if let Some(model) = non_empty_env("WATCHCAM_MODEL") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(interval) = non_empty_env("WATCHCAM_INTERVAL_SECS") {
            let secs: f64 = interval
                .parse()
                .map_err(|_| anyhow!("WATCHCAM_INTERVAL_SECS must be a number of seconds"))?;
            self.watch.interval = seconds("WATCHCAM_INTERVAL_SECS", secs)?;
        }
        if let Some(duration) = non_empty_env("WATCHCAM_DURATION_SECS") {
            let secs: f64 = duration
                .parse()
                .map_err(|_| anyhow!("WATCHCAM_DURATION_SECS must be a number of seconds"))?;
            self.watch.duration = seconds("WATCHCAM_DURATION_SECS", secs)?;
        }
        if let Some(attempts) = non_empty_env("WATCHCAM_ATTEMPTS") {
            self.watch.attempts = attempts
                .parse()
                .map_err(|_| anyhow!("WATCHCAM_ATTEMPTS must be a non-negative integer"))?;
        }
        if let Some(repeat) = non_empty_env("WATCHCAM_REPEAT") {
            self.watch.repeat = parse_bool("WATCHCAM_REPEAT", &repeat)?;
        }
        Ok(())
    }

    /// Check invariants. Also run after CLI overrides are applied.
    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.camera.fps == 0 {
            return Err(anyhow!("camera fps must be >= 1"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be >= 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// Seconds as a `Duration`; rejects negative and non-finite values.
pub fn seconds(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{} must be a non-negative number of seconds", field))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be a boolean", key)),
    }
}
