//! Wall clock and pauses.
//!
//! Every pause in the crate (poll interval, still spacing, synthetic recording)
//! goes through a `Clock`, so the loop can be driven without real sleeping.

use chrono::{Local, NaiveDateTime, TimeDelta};
use std::sync::Mutex;
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real local time and `std::thread::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Clock that only moves when slept on. Every pause is recorded.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

struct ManualState {
    now: NaiveDateTime,
    pauses: Vec<Duration>,
}

impl ManualClock {
    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now,
                pauses: Vec::new(),
            }),
        }
    }

    /// Move time forward without recording a pause.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.now = add(state.now, duration);
    }

    /// All pauses requested so far, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.lock().pauses.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.lock().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.pauses.push(duration);
        state.now = add(state.now, duration);
    }
}

fn add(at: NaiveDateTime, duration: Duration) -> NaiveDateTime {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(at)
}
