use anyhow::Result;
use std::collections::VecDeque;
use std::path::Path;

use crate::detect::backend::DetectionEngine;
use crate::detect::result::{BoundingBox, Detection, PERSON_LABEL};

/// Scripted engine for tests and demos.
///
/// The n-th call reports the n-th scripted number of people; once the script
/// runs out every call reports nobody. The image is not read.
#[derive(Debug, Default)]
pub struct StubEngine {
    script: VecDeque<u32>,
    calls: u64,
}

impl StubEngine {
    /// An engine that never sees anyone.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted<I: IntoIterator<Item = u32>>(persons: I) -> Self {
        Self {
            script: persons.into_iter().collect(),
            calls: 0,
        }
    }

    /// Number of `detect` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectionEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _image: &Path) -> Result<Vec<Detection>> {
        self.calls += 1;
        let persons = self.script.pop_front().unwrap_or(0);
        let width = 1.0 / persons.max(1) as f32;

        Ok((0..persons)
            .map(|i| {
                Detection::new(
                    PERSON_LABEL,
                    0.9,
                    BoundingBox::new(i as f32 * width, 0.2, width * 0.8, 0.6),
                )
            })
            .collect())
    }
}
