//! Capture-detect-record loop.
//!
//! ```text
//!            person seen                  repeat
//! Polling ───────────────▶ Recording ───────────────▶ Polling
//!    │                         │
//!    │ budget exhausted        │ no repeat
//!    ▼                         ▼
//!   Done ◀─────────────────────┘
//! ```
//!
//! One poll = capture a still, count people, pause `interval`, spend one
//! attempt. A single positive poll triggers a recording. Repeats continue with
//! whatever budget is left; the budget is never refilled. Adapter failures are
//! not retried: the first one ends the run and nothing is returned.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::CaptureDevice;
use crate::clock::Clock;
use crate::detect::{DetectionEngine, PersonDetector};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);
/// Roughly eight hours of polling at the default interval.
pub const DEFAULT_ATTEMPTS: u32 = 960;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchParams {
    /// Pause after every poll.
    pub interval: Duration,
    /// Length of each recording.
    pub duration: Duration,
    /// Poll budget for the whole run, shared by all repeat cycles.
    pub attempts: u32,
    /// Go back to polling after a recording.
    pub repeat: bool,
    /// Show a live preview during captures.
    pub preview: bool,
}

impl Default for WatchParams {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            duration: DEFAULT_DURATION,
            attempts: DEFAULT_ATTEMPTS,
            repeat: true,
            preview: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Polling,
    Recording,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopState {
    pub phase: Phase,
    pub remaining_attempts: u32,
    pub detected: bool,
    pub polls: u32,
}

impl LoopState {
    pub fn new(attempts: u32) -> Self {
        Self {
            phase: if attempts == 0 {
                Phase::Done
            } else {
                Phase::Polling
            },
            remaining_attempts: attempts,
            detected: false,
            polls: 0,
        }
    }

    /// Account for one finished poll that saw `persons` people.
    pub fn record_poll(&mut self, persons: u32) {
        self.polls += 1;
        self.remaining_attempts = self.remaining_attempts.saturating_sub(1);
        self.detected = persons > 0;
        self.phase = if self.detected {
            Phase::Recording
        } else if self.remaining_attempts == 0 {
            Phase::Done
        } else {
            Phase::Polling
        };
    }

    /// Leave `Recording`.
    pub fn finish_recording(&mut self, repeat: bool) {
        self.detected = false;
        self.phase = if repeat && self.remaining_attempts > 0 {
            Phase::Polling
        } else {
            Phase::Done
        };
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Done;
    }
}

/// Raise the stop flag. Returns `true` if a stop had already been requested.
pub fn request_stop(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}

pub struct Watcher<C, E> {
    camera: C,
    detector: PersonDetector<E>,
    clock: Arc<dyn Clock>,
    stop: Option<Arc<AtomicBool>>,
}

impl<C: CaptureDevice, E: DetectionEngine> Watcher<C, E> {
    pub fn new(camera: C, detector: PersonDetector<E>, clock: Arc<dyn Clock>) -> Self {
        Self {
            camera,
            detector,
            clock,
            stop: None,
        }
    }

    /// Stop at the next poll boundary once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn detector(&self) -> &PersonDetector<E> {
        &self.detector
    }

    /// Run until the budget is spent (or a non-repeating recording ends).
    ///
    /// Returns the recorded video paths in order, empty if nobody showed up.
    pub fn run(&mut self, params: &WatchParams) -> Result<Vec<PathBuf>> {
        let mut state = LoopState::new(params.attempts);
        let mut recordings = Vec::new();
        log::info!(
            "watching: interval={:.1}s duration={:.1}s attempts={} repeat={}",
            params.interval.as_secs_f64(),
            params.duration.as_secs_f64(),
            params.attempts,
            params.repeat
        );

        loop {
            // A triggered recording always runs; stops land between polls.
            if state.phase == Phase::Polling && self.stop_requested() {
                log::warn!("stop requested, ending watch after {} polls", state.polls);
                state.stop();
            }
            match state.phase {
                Phase::Polling => self.poll(&mut state, params)?,
                Phase::Recording => {
                    let video = self.camera.capture_video(params.duration, params.preview)?;
                    log::info!(
                        "recording #{} saved to {}",
                        recordings.len() + 1,
                        video.path.display()
                    );
                    recordings.push(video.path);
                    state.finish_recording(params.repeat);
                }
                Phase::Done => break,
            }
        }

        log::info!(
            "watch finished: {} polls, {} recording(s), {} attempts left",
            state.polls,
            recordings.len(),
            state.remaining_attempts
        );
        Ok(recordings)
    }

    fn poll(&mut self, state: &mut LoopState, params: &WatchParams) -> Result<()> {
        let still = self.camera.capture_still(params.preview)?;
        let summary = self.detector.detect(&still.path)?;
        self.clock.sleep(params.interval);
        state.record_poll(summary.persons);
        log::debug!(
            "poll {}: {} person(s), {} attempts left",
            state.polls,
            summary.persons,
            state.remaining_attempts
        );
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
