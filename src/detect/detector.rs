use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::detect::annotate::write_annotated;
use crate::detect::backend::DetectionEngine;
use crate::detect::result::{Detection, DetectionSummary};

/// Everything one detection call produced.
#[derive(Clone, Debug)]
pub struct Inspection {
    pub detections: Vec<Detection>,
    pub summary: DetectionSummary,
    /// Annotated copy of the input, when annotation is enabled.
    pub annotated: Option<PathBuf>,
}

/// Detection adapter used by the watch loop.
///
/// Wraps an engine that stays loaded across calls, reduces its output to a
/// person count and, unless disabled, writes an annotated copy of each image.
pub struct PersonDetector<E> {
    engine: E,
    annotate: bool,
    runs: u64,
}

impl<E: DetectionEngine> PersonDetector<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            annotate: true,
            runs: 0,
        }
    }

    pub fn with_annotations(mut self, enabled: bool) -> Self {
        self.annotate = enabled;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Number of images inspected so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.engine.warm_up()
    }

    /// Count the people in `image`.
    pub fn detect(&mut self, image: &Path) -> Result<DetectionSummary> {
        Ok(self.inspect(image)?.summary)
    }

    /// Run the engine on `image` and keep the full result.
    pub fn inspect(&mut self, image: &Path) -> Result<Inspection> {
        let detections = self.engine.detect(image)?;
        self.runs += 1;
        for detection in &detections {
            log::debug!(
                "{} : {:.2} ({})",
                detection.label,
                detection.percentage(),
                image.display()
            );
        }

        let annotated = if self.annotate {
            Some(write_annotated(image, &detections)?)
        } else {
            None
        };

        let summary = DetectionSummary::from_detections(&detections);
        log::info!(
            "{}: {} person(s), {} object(s) [{}]",
            image.display(),
            summary.persons,
            summary.total,
            self.engine.name()
        );

        Ok(Inspection {
            detections,
            summary,
            annotated,
        })
    }
}
