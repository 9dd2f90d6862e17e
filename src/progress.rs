// src/progress.rs

//! Progress reporting for blocking repository steps
//!
//! Refresh and cache building can block on network or removable media.
//! The `ProgressTracker` trait lets the refresh engine report what it is
//! doing without knowing whether a spinner, a log line, or nothing at all
//! ends up on screen.
//!
//! - `SpinnerProgress`: indicatif spinner on an interactive terminal
//! - `LogProgress`: reports through tracing (non-interactive runs)
//! - `SilentProgress`: no-op for quiet mode and tests

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;
use tracing::info;

/// Core trait for progress tracking
pub trait ProgressTracker {
    /// Start (or restart) an activity
    fn start(&self, message: &str);

    /// Update the status message of the running activity
    fn set_message(&self, message: &str);

    /// Finish successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish with an error/abandonment message
    fn finish_with_error(&self, message: &str);
}

/// No-op progress tracker
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressTracker for SilentProgress {
    fn start(&self, _message: &str) {}
    fn set_message(&self, _message: &str) {}
    fn finish_with_message(&self, _message: &str) {}
    fn finish_with_error(&self, _message: &str) {}
}

/// Progress tracker that logs to tracing
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressTracker for LogProgress {
    fn start(&self, message: &str) {
        info!("{}", message);
    }

    fn set_message(&self, message: &str) {
        info!("{}", message);
    }

    fn finish_with_message(&self, message: &str) {
        info!("{} [done]", message);
    }

    fn finish_with_error(&self, message: &str) {
        info!("{} [error]", message);
    }
}

/// Terminal spinner
pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker for SpinnerProgress {
    fn start(&self, message: &str) {
        self.bar.reset();
        self.bar.set_message(message.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(format!("{} [done]", message));
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("{} [error]", message));
    }
}

/// Pick a tracker for the current environment
///
/// Quiet and machine-readable runs stay silent, interactive terminals get a
/// spinner, everything else logs.
pub fn for_environment(quiet: bool, machine_readable: bool) -> Box<dyn ProgressTracker> {
    if quiet || machine_readable {
        Box::new(SilentProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(SpinnerProgress::new())
    } else {
        Box::new(LogProgress)
    }
}
