use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

const JPEG_QUALITY: u8 = 90;
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "capture-v4l2"), allow(dead_code))]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    Mjpeg,
}

/// Turn one sensor frame into a JPEG file body.
///
/// MJPEG frames are already JPEG and pass through after a marker check.
#[cfg_attr(not(feature = "capture-v4l2"), allow(dead_code))]
pub(crate) fn frame_to_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Mjpeg => {
            if !pixels.starts_with(&JPEG_SOI) {
                return Err(anyhow!("MJPEG frame does not start with a JPEG SOI marker"));
            }
            Ok(pixels.to_vec())
        }
        PixelFormat::Rgb24 | PixelFormat::Nv12 => {
            let rgb = normalize_to_rgb(pixels, width, height, format)?;
            encode_rgb_jpeg(&rgb, width, height)
        }
    }
}

pub(crate) fn encode_rgb_jpeg(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| anyhow!("JPEG encode failed: {}", e))?;
    Ok(out)
}

fn normalize_to_rgb(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = width
                .checked_mul(height)
                .and_then(|v| v.checked_mul(3))
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
            if pixels.len() != expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok(pixels.to_vec())
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
        PixelFormat::Mjpeg => Err(anyhow!("MJPEG frames are not raw pixels")),
    }
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    // Chroma is subsampled 2x2.
    if width % 2 != 0 || height % 2 != 0 {
        return Err(anyhow!(
            "NV12 frame needs even dimensions, got {}x{}",
            width,
            height
        ));
    }
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "NV12 frame too short: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_rejects_odd_dimensions() {
        let nv12 = vec![128u8; 64];
        assert!(normalize_to_rgb(&nv12, 3, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_rgb(&nv12, 2, 3, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let rgb = normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(rgb, vec![128u8; 12]);

        Ok(())
    }

    #[test]
    fn rgb_frames_encode_to_decodable_jpeg() -> Result<()> {
        let pixels = vec![200u8; 8 * 6 * 3];
        let jpeg = frame_to_jpeg(&pixels, 8, 6, PixelFormat::Rgb24)?;
        assert!(jpeg.starts_with(&JPEG_SOI));

        let decoded = image::load_from_memory(&jpeg)?;
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        Ok(())
    }

    #[test]
    fn rgb_length_is_validated() {
        let pixels = vec![1u8; 10];
        assert!(frame_to_jpeg(&pixels, 1, 3, PixelFormat::Rgb24).is_err());
    }

    #[test]
    fn mjpeg_without_marker_is_rejected() {
        assert!(frame_to_jpeg(b"not a jpeg", 1, 1, PixelFormat::Mjpeg).is_err());
    }
}
