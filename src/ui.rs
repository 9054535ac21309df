//! Terminal stages and live preview.
//!
//! On a TTY both render as `indicatif` spinners; otherwise they fall back to
//! plain stderr lines. Either way the guard owns the teardown: dropping it
//! stops the spinner, so a preview cannot outlive the capture call that
//! started it, even when that call fails.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

static ACTIVE_PREVIEWS: AtomicUsize = AtomicUsize::new(0);

/// Number of previews currently running in this process.
pub fn active_previews() -> usize {
    ACTIVE_PREVIEWS.load(Ordering::SeqCst)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    /// Build from the process's stderr/stdout terminal state.
    pub fn detect(ui_flag: Option<&str>) -> Self {
        let is_tty = std::io::stderr().is_terminal();
        let stdout_is_tty = std::io::stdout().is_terminal();
        Self::from_args(ui_flag, is_tty, !stdout_is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    fn spinner(&self, message: String) -> Option<ProgressBar> {
        if !self.use_pretty() {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message);
        Some(spinner)
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = self.spinner(format!("{name}…"));
        if spinner.is_none() {
            eprintln!("==> {}", name);
        }
        StageGuard::new(name.to_string(), spinner)
    }

    /// Start a live preview of `source`. Stops when the guard drops.
    pub fn preview(&self, source: &str) -> PreviewGuard {
        ACTIVE_PREVIEWS.fetch_add(1, Ordering::SeqCst);
        let spinner = self.spinner(format!("preview {source}"));
        if spinner.is_none() {
            eprintln!("preview started: {}", source);
        }
        log::debug!("preview started for {}", source);
        PreviewGuard {
            source: source.to_string(),
            start: Instant::now(),
            spinner,
        }
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::detect(None)
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct PreviewGuard {
    source: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl PreviewGuard {
    /// Report the latest frame shown in the preview.
    pub fn frame(&self, index: u64) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!(
                "preview {}: frame {} ({})",
                self.source,
                index,
                format_duration(self.start.elapsed())
            ));
        }
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        } else {
            eprintln!(
                "preview stopped: {} ({})",
                self.source,
                format_duration(self.start.elapsed())
            );
        }
        log::debug!("preview stopped for {}", self.source);
        ACTIVE_PREVIEWS.fetch_sub(1, Ordering::SeqCst);
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_spins() {
        let ui = Ui::from_args(Some("plain"), true, false);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(Some("pretty"), false, false);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(None, true, true);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(None, true, false);
        assert!(ui.use_pretty());
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
