mod annotate;
mod backend;
mod backends;
mod detector;
mod registry;
mod result;

pub use backend::DetectionEngine;
pub use backends::StubEngine;
#[cfg(feature = "backend-tract")]
pub use backends::TractEngine;
pub use detector::{Inspection, PersonDetector};
pub use registry::{open_engine, EngineKind};
pub use result::{non_max_suppression, BoundingBox, Detection, DetectionSummary, PERSON_LABEL};
