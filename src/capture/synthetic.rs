//! Synthetic sensor (`stub://` devices) for tests and demos.
//!
//! Produces a moving gradient so consecutive frames differ. Recording writes
//! `fps * duration` frames and then pauses on the shared clock for the full
//! duration, so a manual clock observes exactly one pause per recording.
//!
//! `stub://unavailable` behaves like an unplugged camera.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use super::normalize::encode_rgb_jpeg;
use super::CameraConfig;
use crate::clock::Clock;
use crate::ui::PreviewGuard;
use crate::CaptureFailure;

const UNAVAILABLE_DEVICE: &str = "stub://unavailable";

pub(crate) struct SyntheticSensor {
    config: CameraConfig,
    clock: Arc<dyn Clock>,
    frame_count: u64,
}

impl SyntheticSensor {
    pub(crate) fn new(config: CameraConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            frame_count: 0,
        }
    }

    fn open(&self) -> Result<()> {
        if self.config.device == UNAVAILABLE_DEVICE {
            return Err(CaptureFailure::device(format!(
                "{}: no such device",
                self.config.device
            ))
            .into());
        }
        log::debug!("SyntheticSensor: opened {}", self.config.device);
        Ok(())
    }

    pub(crate) fn grab_still(&mut self, preview: Option<&PreviewGuard>) -> Result<Vec<u8>> {
        self.open()?;
        let jpeg = self.next_jpeg()?;
        if let Some(preview) = preview {
            preview.frame(self.frame_count);
        }
        Ok(jpeg)
    }

    pub(crate) fn record(
        &mut self,
        duration: Duration,
        out: &mut dyn Write,
        preview: Option<&PreviewGuard>,
    ) -> Result<u64> {
        self.open()?;
        let frames = (duration.as_secs_f64() * self.config.fps as f64).ceil() as u64;
        for _ in 0..frames {
            let jpeg = self.next_jpeg()?;
            out.write_all(&jpeg)
                .map_err(|e| CaptureFailure::io(format!("write video frame: {}", e)))?;
            if let Some(preview) = preview {
                preview.frame(self.frame_count);
            }
        }
        self.clock.sleep(duration);
        Ok(frames)
    }

    fn next_jpeg(&mut self) -> Result<Vec<u8>> {
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels()?;
        encode_rgb_jpeg(&pixels, self.config.width, self.config.height)
    }

    fn generate_synthetic_pixels(&self) -> Result<Vec<u8>> {
        let pixel_count = self
            .config
            .width
            .checked_mul(self.config.height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| {
                CaptureFailure::device(format!(
                    "{}: {}x{} frame is too large",
                    self.config.device, self.config.width, self.config.height
                ))
            })?;
        let mut pixels = vec![0u8; pixel_count as usize];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 / 3 + self.frame_count * 7) % 256) as u8;
        }
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn sensor(width: u32, height: u32) -> SyntheticSensor {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let config = CameraConfig {
            device: "stub://bench".to_string(),
            width,
            height,
            fps: 2,
            warmup_frames: 0,
            output_dir: ".".into(),
        };
        SyntheticSensor::new(config, Arc::new(ManualClock::starting_at(start)))
    }

    #[test]
    fn oversized_frames_are_an_error() {
        let err = sensor(100_000, 100_000).grab_still(None).unwrap_err();
        assert_eq!(
            crate::failure_kind(&err),
            Some(crate::FailureKind::DeviceUnavailable)
        );
    }

    #[test]
    fn stills_are_jpeg() -> Result<()> {
        let jpeg = sensor(8, 6).grab_still(None)?;
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
        Ok(())
    }
}
