// src/exit_code.rs

//! Process exit codes
//!
//! Every workflow ends in exactly one of these codes. The numeric values
//! are part of the command-line contract and are relied upon by scripts,
//! so they must never be renumbered.

use std::fmt;

/// Exit status of a command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExitCode {
    /// Command completed successfully
    #[default]
    Ok,
    /// Unexpected failure, most likely a defect
    Bug,
    /// Bad command-line usage
    Syntax,
    /// Bad argument value or unknown selector
    InvalidArgs,
    /// Failure reported by the repository, cache or target layer
    LibraryError,
    /// Command needs elevated privileges
    Privileges,
    /// Another instance holds the system lock
    LibraryBusy,
    /// User aborted the operation
    Aborted,
    /// patch-check: updates are available
    UpdateNeeded,
    /// patch-check: security updates are available
    SecurityUpdateNeeded,
}

impl ExitCode {
    /// Numeric process exit status
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::Bug => 1,
            ExitCode::Syntax => 2,
            ExitCode::InvalidArgs => 3,
            ExitCode::LibraryError => 4,
            ExitCode::Privileges => 5,
            ExitCode::LibraryBusy => 7,
            ExitCode::Aborted => 8,
            ExitCode::UpdateNeeded => 100,
            ExitCode::SecurityUpdateNeeded => 101,
        }
    }

    /// Informational codes do not signal a failure
    pub fn is_informational(self) -> bool {
        matches!(self, ExitCode::UpdateNeeded | ExitCode::SecurityUpdateNeeded)
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Ok || self.is_informational()
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // every value fits in a u8
        std::process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_are_stable() {
        assert_eq!(ExitCode::Ok.code(), 0);
        assert_eq!(ExitCode::InvalidArgs.code(), 3);
        assert_eq!(ExitCode::Privileges.code(), 5);
        assert_eq!(ExitCode::LibraryBusy.code(), 7);
        assert_eq!(ExitCode::SecurityUpdateNeeded.code(), 101);
    }

    #[test]
    fn test_informational_codes_are_success() {
        assert!(ExitCode::UpdateNeeded.is_success());
        assert!(!ExitCode::LibraryError.is_success());
    }
}
