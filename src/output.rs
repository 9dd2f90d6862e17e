// src/output.rs

//! User-facing output
//!
//! Normal messages go to stdout, warnings, errors and hints go to stderr.
//! Messages carry the verbosity level they need to be shown at, so quiet
//! mode drops chatter while errors always come through. Diagnostic logging
//! is separate and goes through `tracing`.
//!
//! Tests build a captured `Output` which records messages instead of
//! printing them.

use crate::error::Error;
use std::cell::RefCell;
use std::io::Write;

/// How much the user wants to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    High,
    Debug,
}

impl Verbosity {
    /// Derive the level from the `-q` flag and the number of `-v` flags
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Verbosity::Quiet;
        }
        match verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::High,
            _ => Verbosity::Debug,
        }
    }
}

/// Kind of a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
    Hint,
    /// Command results (listings, JSON documents)
    Data,
}

/// A recorded message (captured mode only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

/// Verbosity-aware writer for user messages
#[derive(Debug, Default)]
pub struct Output {
    verbosity: Verbosity,
    machine_readable: bool,
    capture: Option<RefCell<Vec<Message>>>,
}

impl Output {
    pub fn new(verbosity: Verbosity, machine_readable: bool) -> Self {
        Self {
            verbosity,
            machine_readable,
            capture: None,
        }
    }

    /// Output that records messages instead of printing them
    pub fn captured(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            machine_readable: false,
            capture: Some(RefCell::new(Vec::new())),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    pub fn is_machine_readable(&self) -> bool {
        self.machine_readable
    }

    /// Informational message at normal verbosity
    pub fn info(&self, text: impl AsRef<str>) {
        self.info_at(Verbosity::Normal, text);
    }

    /// Informational message shown only at `level` or above
    pub fn info_at(&self, level: Verbosity, text: impl AsRef<str>) {
        if self.verbosity >= level {
            self.emit(MessageKind::Info, text.as_ref());
        }
    }

    pub fn warning(&self, text: impl AsRef<str>) {
        self.warning_at(Verbosity::Normal, text);
    }

    /// Warning shown only at `level` or above; `Quiet` means always
    pub fn warning_at(&self, level: Verbosity, text: impl AsRef<str>) {
        if self.verbosity >= level {
            self.emit(MessageKind::Warning, text.as_ref());
        }
    }

    /// Error message, shown at every verbosity
    pub fn error(&self, text: impl AsRef<str>) {
        self.emit(MessageKind::Error, text.as_ref());
    }

    /// Actionable hint accompanying an error or warning
    pub fn hint(&self, text: impl AsRef<str>) {
        self.emit(MessageKind::Hint, text.as_ref());
    }

    /// Command result, shown at every verbosity
    pub fn data(&self, text: impl AsRef<str>) {
        self.emit(MessageKind::Data, text.as_ref());
    }

    /// Report an error with its hint, if it has one
    pub fn report(&self, err: &Error) {
        self.error(err.to_string());
        if let Some(hint) = err.hint() {
            self.hint(hint);
        }
    }

    /// Recorded messages (empty unless captured)
    pub fn messages(&self) -> Vec<Message> {
        self.capture
            .as_ref()
            .map(|c| c.borrow().clone())
            .unwrap_or_default()
    }

    /// Whether any recorded message of `kind` contains `needle`
    pub fn contains(&self, kind: MessageKind, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|m| m.kind == kind && m.text.contains(needle))
    }

    pub fn clear(&self) {
        if let Some(capture) = &self.capture {
            capture.borrow_mut().clear();
        }
    }

    fn emit(&self, kind: MessageKind, text: &str) {
        if let Some(capture) = &self.capture {
            capture.borrow_mut().push(Message {
                kind,
                text: text.to_string(),
            });
            return;
        }

        // Write failures (closed pipe) are not worth aborting a command for
        match kind {
            MessageKind::Info | MessageKind::Data => {
                let _ = writeln!(std::io::stdout(), "{}", text);
            }
            MessageKind::Warning => {
                let _ = writeln!(std::io::stderr(), "Warning: {}", text);
            }
            MessageKind::Error => {
                let _ = writeln!(std::io::stderr(), "{}", text);
            }
            MessageKind::Hint => {
                let _ = writeln!(std::io::stderr(), "{}", text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::High);
        assert_eq!(Verbosity::from_flags(false, 2), Verbosity::Debug);
    }

    #[test]
    fn test_quiet_drops_info_but_keeps_errors() {
        let out = Output::captured(Verbosity::Quiet);
        out.info("chatter");
        out.warning_at(Verbosity::Quiet, "important warning");
        out.error("broken");

        let messages = out.messages();
        assert_eq!(messages.len(), 2);
        assert!(out.contains(MessageKind::Warning, "important"));
        assert!(out.contains(MessageKind::Error, "broken"));
    }

    #[test]
    fn test_report_includes_hint() {
        let out = Output::captured(Verbosity::Normal);
        out.report(&Error::InvalidSelectors(vec!["nope".to_string()]));
        assert!(out.contains(MessageKind::Error, "'nope'"));
        assert!(out.contains(MessageKind::Hint, "pkgctl repos"));
    }
}
