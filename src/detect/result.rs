/// Label the watch loop reacts to.
pub const PERSON_LABEL: &str = "person";

/// One object found in an image.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// Bounding box (normalized 0..1 coordinates).
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    pub fn is_person(&self) -> bool {
        self.label == PERSON_LABEL
    }

    /// Confidence as a percentage (0..100).
    pub fn percentage(&self) -> f32 {
        self.confidence * 100.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Clamp to the unit square.
    pub fn clamped(self) -> Self {
        let x0 = self.x.clamp(0.0, 1.0);
        let y0 = self.y.clamp(0.0, 1.0);
        let x1 = (self.x + self.w).clamp(0.0, 1.0);
        let y1 = (self.y + self.h).clamp(0.0, 1.0);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = ((self.x + self.w).min(other.x + other.w) - self.x.max(other.x)).max(0.0);
        let iy = ((self.y + self.h).min(other.y + other.h) - self.y.max(other.y)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Pixel rectangle `(x, y, w, h)` inside a `width` x `height` image, at least 1x1.
    pub fn to_pixels(&self, width: u32, height: u32) -> (i32, i32, u32, u32) {
        let b = self.clamped();
        let x = (b.x * width as f32).round() as i32;
        let y = (b.y * height as f32).round() as i32;
        let w = ((b.w * width as f32).round() as u32).max(1);
        let h = ((b.h * height as f32).round() as u32).max(1);
        (x, y, w, h)
    }
}

/// What the watch loop consumes from one detection call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    /// Detections labeled "person".
    pub persons: u32,
    /// All detections.
    pub total: u32,
}

impl DetectionSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        Self {
            persons: detections.iter().filter(|d| d.is_person()).count() as u32,
            total: detections.len() as u32,
        }
    }
}

/// Greedy per-label non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = kept
            .iter()
            .any(|k| k.label == candidate.label && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(confidence: f32, x: f32) -> Detection {
        Detection::new(PERSON_LABEL, confidence, BoundingBox::new(x, 0.1, 0.2, 0.5))
    }

    #[test]
    fn summary_counts_only_people() {
        let detections = vec![
            person(0.9, 0.1),
            Detection::new("dog", 0.8, BoundingBox::new(0.5, 0.5, 0.1, 0.1)),
            person(0.6, 0.6),
        ];
        let summary = DetectionSummary::from_detections(&detections);
        assert_eq!(summary, DetectionSummary { persons: 2, total: 3 });
        assert_eq!(DetectionSummary::from_detections(&[]).persons, 0);
    }

    #[test]
    fn nms_drops_overlapping_boxes_of_the_same_label() {
        let detections = vec![
            person(0.7, 0.11),
            person(0.9, 0.10),
            person(0.8, 0.70),
            Detection::new("chair", 0.5, BoundingBox::new(0.1, 0.1, 0.2, 0.5)),
        ];
        let kept = non_max_suppression(detections, 0.45);

        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.8);
        assert_eq!(kept[2].label, "chair");
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let b = BoundingBox::new(0.5, 0.5, 0.2, 0.2);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pixel_rect_is_clamped_and_non_empty() {
        let bbox = BoundingBox::new(-0.1, 0.5, 0.0, 0.9);
        assert_eq!(bbox.to_pixels(100, 50), (0, 25, 1, 25));
    }
}
