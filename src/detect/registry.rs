use anyhow::{anyhow, Result};
use std::str::FromStr;

use crate::config::DetectorSettings;
use crate::detect::backend::DetectionEngine;
use crate::detect::backends::StubEngine;

/// Detection engines this build knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    Stub,
    Tract,
}

impl EngineKind {
    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Stub => "stub",
            EngineKind::Tract => "tract",
        }
    }
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(EngineKind::Stub),
            "tract" => Ok(EngineKind::Tract),
            other => Err(anyhow!(
                "unknown detection backend '{}' (expected 'stub' or 'tract')",
                other
            )),
        }
    }
}

/// Load the configured engine. Model loading happens here, once.
pub fn open_engine(settings: &DetectorSettings) -> Result<Box<dyn DetectionEngine>> {
    match settings.backend {
        EngineKind::Stub => {
            log::info!(
                "using stub detection engine (script of {} polls)",
                settings.script.len()
            );
            Ok(Box::new(StubEngine::scripted(settings.script.iter().copied())))
        }
        EngineKind::Tract => open_tract(settings),
    }
}

#[cfg(feature = "backend-tract")]
fn open_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectionEngine>> {
    let engine = crate::detect::backends::TractEngine::load(
        &settings.model_path,
        settings.input_size,
        settings.input_size,
    )?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(_settings: &DetectorSettings) -> Result<Box<dyn DetectionEngine>> {
    Err(anyhow!(
        "the tract detection backend requires the backend-tract feature"
    ))
}
