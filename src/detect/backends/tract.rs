#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use super::coco::COCO_LABELS;
use crate::detect::backend::DetectionEngine;
use crate::detect::result::{non_max_suppression, BoundingBox, Detection};
use crate::CaptureFailure;

/// Minimum class score for a box to count as a detection.
const SCORE_THRESHOLD: f32 = 0.5;
const IOU_THRESHOLD: f32 = 0.45;
const BOX_COORDS: usize = 4;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Tract-based engine for YOLOv8-style ONNX detectors.
///
/// Expects a `[1, 3, H, W]` float input and a `[1, 4 + 80, N]` output
/// (`cx, cy, w, h` in input pixels followed by COCO class scores). The model is
/// loaded once in `load` and reused for every image.
pub struct TractEngine {
    model: OnnxPlan,
    width: u32,
    height: u32,
}

impl TractEngine {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(CaptureFailure::model(format!(
                "model file {} not found",
                model_path.display()
            ))
            .into());
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        f32::datum_type(),
                        tvec!(1, 3, height as usize, width as usize),
                    ),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                CaptureFailure::model(format!(
                    "failed to load ONNX model from {}: {:#}",
                    model_path.display(),
                    e
                ))
            })?;

        log::info!(
            "TractEngine: loaded {} ({}x{} input)",
            model_path.display(),
            width,
            height
        );
        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, image: &Path) -> Result<Tensor> {
        let decoded = image::open(image).map_err(|e| {
            CaptureFailure::inference(format!("cannot read image {}: {}", image.display(), e))
        })?;
        let rgb = decoded
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| rgb.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| anyhow!("model output tensor was not f32: {}", e))?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| anyhow!("unexpected model output shape: {}", e))?;

        // Some exports transpose to [1, N, 84].
        let (channels, anchors) = (view.shape()[1], view.shape()[2]);
        let transposed = channels > anchors;
        let (channels, anchors) = if transposed {
            (anchors, channels)
        } else {
            (channels, anchors)
        };
        if channels <= BOX_COORDS {
            return Err(anyhow!("model output has no class scores"));
        }
        let at = |c: usize, i: usize| {
            if transposed {
                view[[0, i, c]]
            } else {
                view[[0, c, i]]
            }
        };

        let (w, h) = (self.width as f32, self.height as f32);
        let mut detections = Vec::new();
        for i in 0..anchors {
            let (class, score) = (BOX_COORDS..channels)
                .map(|c| (c - BOX_COORDS, at(c, i)))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if score < SCORE_THRESHOLD {
                continue;
            }
            let (cx, cy, bw, bh) = (at(0, i), at(1, i), at(2, i), at(3, i));
            let bbox = BoundingBox::new((cx - bw / 2.0) / w, (cy - bh / 2.0) / h, bw / w, bh / h)
                .clamped();
            let label = COCO_LABELS.get(class).copied().unwrap_or("unknown");
            detections.push(Detection::new(label, score.min(1.0), bbox));
        }

        Ok(non_max_suppression(detections, IOU_THRESHOLD))
    }
}

impl DetectionEngine for TractEngine {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &Path) -> Result<Vec<Detection>> {
        let input = self.build_input(image)?;
        let outputs = self.model.run(tvec!(input.into())).map_err(|e| {
            CaptureFailure::inference(format!("ONNX inference failed on {}: {:#}", image.display(), e))
        })?;
        self.decode(outputs)
            .map_err(|e| CaptureFailure::inference(format!("{}: {:#}", image.display(), e)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    #[test]
    fn missing_model_is_a_load_failure() {
        let err = TractEngine::load("does/not/exist.onnx", 640, 640)
            .err()
            .expect("load must fail");
        assert_eq!(
            crate::failure_kind(&err),
            Some(FailureKind::ModelLoadFailure)
        );
    }

    #[test]
    fn garbage_model_is_a_load_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not an onnx graph").unwrap();
        let err = TractEngine::load(file.path(), 64, 64)
            .err()
            .expect("load must fail");
        assert_eq!(
            crate::failure_kind(&err),
            Some(FailureKind::ModelLoadFailure)
        );
    }
}
