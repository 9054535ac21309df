use anyhow::Result;
use std::path::Path;

use crate::detect::result::Detection;

/// Object-detection engine.
///
/// Engines are loaded once and reused for every poll. They read the image
/// file they are given and must not modify it; writing annotated output is
/// the job of `PersonDetector`.
pub trait DetectionEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Run detection on the image at `image`.
    ///
    /// Confidence scores are in `0.0..=1.0`, boxes are normalized to the image.
    fn detect(&mut self, image: &Path) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: DetectionEngine + ?Sized> DetectionEngine for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, image: &Path) -> Result<Vec<Detection>> {
        (**self).detect(image)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
