use anyhow::Result;
use image::{ImageFormat, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::detect::result::Detection;
use crate::naming;
use crate::CaptureFailure;

const PERSON_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OTHER_COLOR: Rgb<u8> = Rgb([0, 200, 255]);
const BORDER_PX: i32 = 2;

/// Draw every detection onto a copy of `image` and save it next to the input.
pub(crate) fn write_annotated(image: &Path, detections: &[Detection]) -> Result<PathBuf> {
    let out = naming::annotated_path(image);
    let mut canvas = image::open(image)
        .map_err(|e| {
            CaptureFailure::inference(format!("cannot read image {}: {}", image.display(), e))
        })?
        .to_rgb8();
    let (width, height) = canvas.dimensions();

    for detection in detections {
        let color = if detection.is_person() {
            PERSON_COLOR
        } else {
            OTHER_COLOR
        };
        let (x, y, w, h) = detection.bbox.to_pixels(width, height);
        for inset in 0..BORDER_PX {
            let (iw, ih) = (w as i32 - 2 * inset, h as i32 - 2 * inset);
            if iw <= 0 || ih <= 0 {
                break;
            }
            let rect = Rect::at(x + inset, y + inset).of_size(iw as u32, ih as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    canvas
        .save_with_format(&out, ImageFormat::Jpeg)
        .map_err(|e| CaptureFailure::io(format!("write {}: {}", out.display(), e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, PERSON_LABEL};
    use image::RgbImage;

    #[test]
    fn annotated_copy_lands_next_to_the_input() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("image_2024-01-01_00:00:00.jpg");
        RgbImage::from_pixel(40, 30, Rgb([0, 0, 0])).save_with_format(&input, ImageFormat::Jpeg)?;

        let detections = vec![Detection::new(
            PERSON_LABEL,
            0.9,
            BoundingBox::new(0.25, 0.25, 0.5, 0.5),
        )];
        let out = write_annotated(&input, &detections)?;

        assert_eq!(out, dir.path().join("detected_image_2024-01-01_00:00:00.jpg"));
        let annotated = image::open(&out)?.to_rgb8();
        assert_eq!(annotated.dimensions(), (40, 30));
        // Box border is reddish, the untouched corner stays dark.
        let border = annotated.get_pixel(10, 15);
        assert!(border[0] > 100 && border[0] > border[2]);
        assert!(annotated.get_pixel(0, 0)[0] < 64);
        Ok(())
    }

    #[test]
    fn missing_input_is_an_inference_failure() {
        let err = write_annotated(Path::new("/nonexistent/image.jpg"), &[]).unwrap_err();
        assert_eq!(
            crate::failure_kind(&err),
            Some(crate::FailureKind::InferenceFailure)
        );
    }
}
