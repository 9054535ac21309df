//! watchcam
//!
//! Person-triggered camera recorder.
//!
//! # Architecture
//!
//! The crate is a single sequential control loop over two adapters:
//!
//! 1. **Capture**: a camera that writes timestamped still images and videos.
//! 2. **Detection**: a pretrained model that reports how many people an image contains.
//! 3. **Watch loop**: polls stills at an interval and switches to recording once a
//!    person shows up, bounded by an attempt budget and optionally repeating.
//!
//! # Module Structure
//!
//! - `capture`: `CaptureDevice` trait, `Camera` (synthetic and V4L2 sensors)
//! - `detect`: `DetectionEngine` trait, engines, `PersonDetector`, annotation
//! - `watch`: the polling/recording state machine (`Watcher`)
//! - `config`: file + environment configuration
//! - `clock`, `naming`, `ui`: time source, artifact names, terminal preview
//! - Core types: `FailureKind`, `CaptureFailure`

pub mod capture;
pub mod clock;
pub mod config;
pub mod detect;
pub mod naming;
pub mod ui;
pub mod watch;

pub use capture::{Camera, CameraConfig, CaptureDevice, CaptureKind, CaptureResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WatchConfig;
pub use detect::{
    open_engine, Detection, DetectionEngine, DetectionSummary, EngineKind, PersonDetector,
    StubEngine, PERSON_LABEL,
};
#[cfg(feature = "backend-tract")]
pub use detect::TractEngine;
pub use watch::{request_stop, LoopState, Phase, WatchParams, Watcher};

// -------------------- Failures --------------------

/// Adapter failure taxonomy.
///
/// None of these are retried by the watch loop; any of them aborts the run.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Camera could not be opened or stopped delivering frames.
    DeviceUnavailable,
    /// Detection model missing or unloadable.
    ModelLoadFailure,
    /// Detection failed on a particular image.
    InferenceFailure,
    /// Writing a capture or annotation to disk failed.
    IoFailure,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::DeviceUnavailable => "DEVICE_UNAVAILABLE",
            FailureKind::ModelLoadFailure => "MODEL_LOAD_FAILURE",
            FailureKind::InferenceFailure => "INFERENCE_FAILURE",
            FailureKind::IoFailure => "IO_FAILURE",
        }
    }
}

/// Typed adapter failure. Travels inside `anyhow::Error`; recover the kind with
/// [`failure_kind`].
#[derive(Clone, Debug)]
pub struct CaptureFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CaptureFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DeviceUnavailable, message)
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ModelLoadFailure, message)
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InferenceFailure, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(FailureKind::IoFailure, message)
    }
}

impl std::fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for CaptureFailure {}

/// Find the adapter failure kind anywhere in an error chain.
pub fn failure_kind(err: &anyhow::Error) -> Option<FailureKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CaptureFailure>())
        .map(|failure| failure.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn failure_kind_survives_context() {
        let err: anyhow::Result<()> = Err(CaptureFailure::device("/dev/video0 busy").into());
        let err = err.context("capture still").unwrap_err();
        assert_eq!(failure_kind(&err), Some(FailureKind::DeviceUnavailable));
        assert!(format!("{:#}", err).contains("DEVICE_UNAVAILABLE: /dev/video0 busy"));
    }

    #[test]
    fn plain_errors_have_no_failure_kind() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(failure_kind(&err), None);
    }
}
