pub mod stub;

#[cfg(feature = "backend-tract")]
mod coco;
#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubEngine;

#[cfg(feature = "backend-tract")]
pub use tract::TractEngine;
