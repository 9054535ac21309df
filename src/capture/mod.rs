//! Capture adapter.
//!
//! `CaptureDevice` is the capability the watch loop depends on. `Camera` is the
//! production implementation; it picks a sensor from the device string:
//! - `stub://...`: synthetic sensor (tests, demos)
//! - anything else: V4L2 device node (feature: capture-v4l2)
//!
//! `Camera` owns everything that is not sensor specific:
//! - Timestamped, collision-free file names in the output directory
//! - At least one second between consecutive stills
//! - Live preview lifetime (torn down on every exit path)
//! - Writing the captured bytes to disk
//!
//! The sensor is acquired inside each capture call and released before it
//! returns.

mod normalize;
mod synthetic;
#[cfg(feature = "capture-v4l2")]
mod v4l2;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::naming;
use crate::ui::{PreviewGuard, Ui};
use crate::CaptureFailure;
use synthetic::SyntheticSensor;
#[cfg(feature = "capture-v4l2")]
use v4l2::DeviceSensor;

/// Minimum spacing between consecutive stills; file names have second granularity.
pub const MIN_STILL_SPACING: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureKind {
    Still,
    Video,
}

/// A file produced by a capture call. The file is never cleaned up by this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureResult {
    pub path: PathBuf,
    pub captured_at: NaiveDateTime,
    pub kind: CaptureKind,
}

/// Camera capability used by the watch loop.
pub trait CaptureDevice {
    /// Write one still image and return its path.
    fn capture_still(&mut self, preview: bool) -> Result<CaptureResult>;

    /// Record for `duration`, then return the video path.
    fn capture_video(&mut self, duration: Duration, preview: bool) -> Result<CaptureResult>;
}

impl<C: CaptureDevice + ?Sized> CaptureDevice for Box<C> {
    fn capture_still(&mut self, preview: bool) -> Result<CaptureResult> {
        (**self).capture_still(preview)
    }

    fn capture_video(&mut self, duration: Duration, preview: bool) -> Result<CaptureResult> {
        (**self).capture_video(duration, preview)
    }
}

/// Configuration for a camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://<name>`.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Frame rate for recordings.
    pub fps: u32,
    /// Frames discarded before a still is kept.
    pub warmup_frames: u32,
    /// Directory that receives stills and videos.
    pub output_dir: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            fps: 15,
            warmup_frames: 5,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Capture counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub stills: u64,
    pub videos: u64,
    pub video_frames: u64,
}

pub struct Camera {
    config: CameraConfig,
    backend: CameraBackend,
    clock: Arc<dyn Clock>,
    ui: Ui,
    last_still_at: Option<NaiveDateTime>,
    stats: CameraStats,
}

enum CameraBackend {
    Synthetic(SyntheticSensor),
    #[cfg(feature = "capture-v4l2")]
    Device(DeviceSensor),
}

impl Camera {
    pub fn new(config: CameraConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        fs::create_dir_all(&config.output_dir).map_err(|e| {
            CaptureFailure::io(format!(
                "create output directory {}: {}",
                config.output_dir.display(),
                e
            ))
        })?;

        let backend = if config.device.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticSensor::new(config.clone(), clock.clone()))
        } else {
            #[cfg(feature = "capture-v4l2")]
            {
                CameraBackend::Device(DeviceSensor::new(config.clone()))
            }
            #[cfg(not(feature = "capture-v4l2"))]
            {
                return Err(anyhow!(
                    "camera device {} requires the capture-v4l2 feature",
                    config.device
                ));
            }
        };

        Ok(Self {
            config,
            backend,
            clock,
            ui: Ui::default(),
            last_still_at: None,
            stats: CameraStats::default(),
        })
    }

    pub fn with_ui(mut self, ui: Ui) -> Self {
        self.ui = ui;
        self
    }

    pub fn stats(&self) -> CameraStats {
        self.stats.clone()
    }

    /// Pause for whatever is left of the minimum spacing since the last still.
    fn pace_still(&self) {
        let Some(last) = self.last_still_at else {
            return;
        };
        let elapsed = (self.clock.now() - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < MIN_STILL_SPACING {
            self.clock.sleep(MIN_STILL_SPACING - elapsed);
        }
    }

    fn start_preview(&self, enabled: bool) -> Option<PreviewGuard> {
        enabled.then(|| self.ui.preview(&self.config.device))
    }

    fn record_to(
        &mut self,
        path: &Path,
        duration: Duration,
        preview: Option<&PreviewGuard>,
    ) -> Result<u64> {
        let file = fs::File::create(path)
            .map_err(|e| CaptureFailure::io(format!("create {}: {}", path.display(), e)))?;
        let mut out = BufWriter::new(file);
        let frames = match &mut self.backend {
            CameraBackend::Synthetic(sensor) => sensor.record(duration, &mut out, preview),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(sensor) => sensor.record(duration, &mut out, preview),
        }?;
        out.flush()
            .map_err(|e| CaptureFailure::io(format!("flush {}: {}", path.display(), e)))?;
        Ok(frames)
    }
}

impl CaptureDevice for Camera {
    fn capture_still(&mut self, preview: bool) -> Result<CaptureResult> {
        self.pace_still();
        let captured_at = self.clock.now();
        let path = naming::unique_path(&self.config.output_dir, &naming::still_name(captured_at));

        let preview = self.start_preview(preview);
        let jpeg = match &mut self.backend {
            CameraBackend::Synthetic(sensor) => sensor.grab_still(preview.as_ref()),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(sensor) => sensor.grab_still(preview.as_ref()),
        };
        drop(preview);
        let jpeg = jpeg?;
        self.last_still_at = Some(captured_at);

        fs::write(&path, jpeg)
            .map_err(|e| CaptureFailure::io(format!("write {}: {}", path.display(), e)))?;
        self.stats.stills += 1;
        log::info!("{} was captured", path.display());

        Ok(CaptureResult {
            path,
            captured_at,
            kind: CaptureKind::Still,
        })
    }

    fn capture_video(&mut self, duration: Duration, preview: bool) -> Result<CaptureResult> {
        let captured_at = self.clock.now();
        let path = naming::unique_path(&self.config.output_dir, &naming::video_name(captured_at));
        log::info!(
            "recording {} for {:.1}s",
            path.display(),
            duration.as_secs_f64()
        );
        let preview = self.start_preview(preview);
        let frames = self.record_to(&path, duration, preview.as_ref());
        drop(preview);
        let frames = match frames {
            Ok(frames) => frames,
            Err(err) => {
                // Failed clips are never reported, so none stay on disk.
                if let Err(e) = fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("could not remove partial clip {}: {}", path.display(), e);
                    }
                }
                return Err(err);
            }
        };

        self.stats.videos += 1;
        self.stats.video_frames += frames;
        log::info!("{} was captured ({} frames)", path.display(), frames);

        Ok(CaptureResult {
            path,
            captured_at,
            kind: CaptureKind::Video,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn clock() -> Arc<ManualClock> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        Arc::new(ManualClock::starting_at(start))
    }

    fn stub_config(dir: &std::path::Path) -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            width: 32,
            height: 24,
            fps: 4,
            warmup_frames: 0,
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn still_is_a_timestamped_jpeg() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut camera = Camera::new(stub_config(dir.path()), clock())?;

        let still = camera.capture_still(false)?;
        assert_eq!(still.kind, CaptureKind::Still);
        assert_eq!(
            still.path,
            dir.path().join("image_2024-03-09_07:30:00.jpg")
        );
        let decoded = image::open(&still.path)?;
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
        Ok(())
    }

    #[test]
    fn back_to_back_stills_are_spaced_one_second() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clock = clock();
        let mut camera = Camera::new(stub_config(dir.path()), clock.clone())?;

        let first = camera.capture_still(false)?;
        let second = camera.capture_still(false)?;

        assert_ne!(first.path, second.path);
        assert_eq!(clock.pauses(), vec![MIN_STILL_SPACING]);
        assert_eq!(
            second.path,
            dir.path().join("image_2024-03-09_07:30:01.jpg")
        );
        Ok(())
    }

    #[test]
    fn spacing_only_covers_the_remainder() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clock = clock();
        let mut camera = Camera::new(stub_config(dir.path()), clock.clone())?;

        camera.capture_still(false)?;
        clock.advance(Duration::from_millis(400));
        camera.capture_still(false)?;
        clock.advance(Duration::from_secs(5));
        camera.capture_still(false)?;

        assert_eq!(clock.pauses(), vec![Duration::from_millis(600)]);
        Ok(())
    }

    #[test]
    fn video_holds_fps_times_duration_frames() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clock = clock();
        let mut camera = Camera::new(stub_config(dir.path()), clock.clone())?;

        let video = camera.capture_video(Duration::from_secs(2), false)?;
        assert_eq!(video.kind, CaptureKind::Video);
        assert_eq!(
            video.path,
            dir.path().join("video_2024-03-09_07:30:00.mjpeg")
        );
        assert_eq!(camera.stats().video_frames, 8);
        assert_eq!(clock.pauses(), vec![Duration::from_secs(2)]);

        let bytes = fs::read(&video.path)?;
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
        Ok(())
    }

    #[test]
    fn unavailable_device_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = stub_config(dir.path());
        config.device = "stub://unavailable".to_string();
        let mut camera = Camera::new(config, clock())?;

        let err = camera.capture_still(false).unwrap_err();
        assert_eq!(
            crate::failure_kind(&err),
            Some(crate::FailureKind::DeviceUnavailable)
        );
        assert_eq!(camera.stats().stills, 0);
        Ok(())
    }

    #[test]
    fn failed_recording_leaves_no_clip_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = stub_config(dir.path());
        config.device = "stub://unavailable".to_string();
        let mut camera = Camera::new(config, clock())?;

        let err = camera
            .capture_video(Duration::from_secs(2), true)
            .unwrap_err();
        assert_eq!(
            crate::failure_kind(&err),
            Some(crate::FailureKind::DeviceUnavailable)
        );
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        assert_eq!(camera.stats().videos, 0);
        Ok(())
    }

    #[cfg(not(feature = "capture-v4l2"))]
    #[test]
    fn real_devices_need_the_v4l2_feature() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = stub_config(dir.path());
        config.device = "/dev/video0".to_string();
        assert!(Camera::new(config, clock()).is_err());
    }
}
