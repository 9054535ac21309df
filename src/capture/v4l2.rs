//! V4L2 sensor.
//!
//! The device node is opened at the start of every capture call and closed
//! when the call returns, so no handle survives the pause between polls.
//!
//! - Stills: discard `warmup_frames` frames (exposure settling), normalize one
//!   frame (MJPG, RGB3 or NV12) to JPEG.
//! - Video: the device must deliver MJPG; frames are appended to the output as a
//!   Motion-JPEG stream until the duration elapses.

use anyhow::Result;
use std::io::Write;
use std::time::{Duration, Instant};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;

use super::normalize::{frame_to_jpeg, PixelFormat};
use super::CameraConfig;
use crate::ui::PreviewGuard;
use crate::CaptureFailure;

const STREAM_BUFFERS: u32 = 4;

pub(crate) struct DeviceSensor {
    config: CameraConfig,
    frame_count: u64,
}

struct OpenDevice {
    device: v4l::Device,
    format: PixelFormat,
    width: u32,
    height: u32,
}

impl DeviceSensor {
    pub(crate) fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn open(&self) -> Result<OpenDevice> {
        let device = v4l::Device::with_path(&self.config.device).map_err(|e| {
            CaptureFailure::device(format!("open v4l2 device {}: {}", self.config.device, e))
        })?;
        let mut format = device.format().map_err(|e| {
            CaptureFailure::device(format!("read v4l2 format on {}: {}", self.config.device, e))
        })?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"MJPG");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "DeviceSensor: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device.format().map_err(|e| {
                    CaptureFailure::device(format!(
                        "read v4l2 format after set failure on {}: {}",
                        self.config.device, e
                    ))
                })?
            }
        };

        if self.config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "DeviceSensor: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        let pixel_format = match &format.fourcc.repr {
            b"MJPG" => PixelFormat::Mjpeg,
            b"RGB3" => PixelFormat::Rgb24,
            b"NV12" => PixelFormat::Nv12,
            other => {
                return Err(CaptureFailure::device(format!(
                    "{} negotiated unsupported pixel format {}",
                    self.config.device,
                    String::from_utf8_lossy(other)
                ))
                .into())
            }
        };

        log::debug!(
            "DeviceSensor: opened {} ({}x{} {:?})",
            self.config.device,
            format.width,
            format.height,
            pixel_format
        );

        Ok(OpenDevice {
            device,
            format: pixel_format,
            width: format.width,
            height: format.height,
        })
    }

    pub(crate) fn grab_still(&mut self, preview: Option<&PreviewGuard>) -> Result<Vec<u8>> {
        let mut open = self.open()?;
        let mut stream = MmapStream::with_buffers(&mut open.device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CaptureFailure::device(format!("create v4l2 buffer stream: {}", e)))?;

        for _ in 0..self.config.warmup_frames {
            stream
                .next()
                .map_err(|e| CaptureFailure::device(format!("capture warm-up frame: {}", e)))?;
        }

        let (buf, meta) = stream
            .next()
            .map_err(|e| CaptureFailure::device(format!("capture v4l2 frame: {}", e)))?;
        self.frame_count += 1;
        if let Some(preview) = preview {
            preview.frame(self.frame_count);
        }

        let used = used_bytes(buf, meta.bytesused, open.format);
        frame_to_jpeg(used, open.width, open.height, open.format)
            .map_err(|e| CaptureFailure::device(format!("{}: {:#}", self.config.device, e)).into())
    }

    pub(crate) fn record(
        &mut self,
        duration: Duration,
        out: &mut dyn Write,
        preview: Option<&PreviewGuard>,
    ) -> Result<u64> {
        let mut open = self.open()?;
        if open.format != PixelFormat::Mjpeg {
            return Err(CaptureFailure::device(format!(
                "{} cannot record: MJPG not supported",
                self.config.device
            ))
            .into());
        }
        let mut stream = MmapStream::with_buffers(&mut open.device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CaptureFailure::device(format!("create v4l2 buffer stream: {}", e)))?;

        let start = Instant::now();
        let mut frames = 0u64;
        while start.elapsed() < duration {
            let (buf, meta) = stream
                .next()
                .map_err(|e| CaptureFailure::device(format!("capture v4l2 frame: {}", e)))?;
            out.write_all(used_bytes(buf, meta.bytesused, PixelFormat::Mjpeg))
                .map_err(|e| CaptureFailure::io(format!("write video frame: {}", e)))?;
            frames += 1;
            self.frame_count += 1;
            if let Some(preview) = preview {
                preview.frame(self.frame_count);
            }
        }
        Ok(frames)
    }
}

/// Compressed frames only fill part of the mapped buffer.
fn used_bytes(buf: &[u8], bytesused: u32, format: PixelFormat) -> &[u8] {
    match format {
        PixelFormat::Mjpeg if bytesused > 0 => &buf[..(bytesused as usize).min(buf.len())],
        _ => buf,
    }
}
