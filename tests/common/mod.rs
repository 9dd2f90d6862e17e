// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pkgctl::cli::{Command, parse_shell_line};
use pkgctl::config::Config;
use pkgctl::output::{MessageKind, Output, Verbosity};
use pkgctl::resolvable::Solver;
use pkgctl::session::{Collaborators, GlobalOptions, Session};
use pkgctl::ExitCode;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use url::Url;

/// A scratch system: a managed root plus a directory of published media.
///
/// Keep the value alive for the duration of the test.
pub struct TestSystem {
    dir: TempDir,
}

impl TestSystem {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Managed root of the sessions created by this system
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("sysroot")
    }

    /// Publish a repository index under `media/<name>` and return its URI
    pub fn publish(&self, name: &str, resolvables: &str) -> Url {
        let media = self.dir.path().join("media").join(name);
        fs::create_dir_all(&media).unwrap();
        fs::write(
            media.join("index.json"),
            format!(r#"{{"name": "{}", "resolvables": {}}}"#, name, resolvables),
        )
        .unwrap();
        Url::from_directory_path(&media).unwrap()
    }

    /// Session over the on-disk collaborators of the scratch root
    pub fn session(&self) -> Session {
        self.session_with(Config::default(), true)
    }

    /// Global options for the scratch root; `privileged: false` simulates
    /// an unprivileged user on the system root
    pub fn options(&self, privileged: bool) -> GlobalOptions {
        let mut options = GlobalOptions {
            non_interactive: true,
            ..Default::default()
        };
        options.set_root(&self.root()).unwrap();
        options.root_changed = privileged;
        options
    }

    pub fn session_with(&self, config: Config, privileged: bool) -> Session {
        self.session_from(self.options(privileged), config)
    }

    pub fn session_from(&self, options: GlobalOptions, config: Config) -> Session {
        let collab = Collaborators::local(&options, &config).unwrap();
        Session::new(options, config, Output::captured(Verbosity::High), collab)
            .with_privileges(false)
    }

    /// Session whose dependency decisions go through `solver`
    pub fn session_with_solver(&self, solver: Box<dyn Solver>) -> Session {
        let options = self.options(true);
        let config = Config::default();
        let mut collab = Collaborators::local(&options, &config).unwrap();
        collab.solver = solver;
        Session::new(options, config, Output::captured(Verbosity::High), collab)
            .with_privileges(false)
    }
}

/// Parse a command line as typed after `pkgctl`
pub fn command(line: &str) -> Command {
    parse_shell_line(line.split_whitespace())
        .unwrap_or_else(|_| panic!("'{}' does not parse", line))
}

/// Run a command line and return its exit code
pub fn run(session: &mut Session, line: &str) -> ExitCode {
    session.run_workflow(command(line))
}

pub fn said(session: &Session, kind: MessageKind, needle: &str) -> bool {
    session.output().contains(kind, needle)
}

/// Aliases currently in the repository store
pub fn aliases(session: &Session) -> Vec<String> {
    session
        .store()
        .repositories()
        .unwrap()
        .into_iter()
        .map(|r| r.alias)
        .collect()
}

/// Names of installed packages
pub fn installed(session: &mut Session) -> Vec<String> {
    session.init_target().unwrap();
    let mut names: Vec<String> = session
        .target()
        .installed()
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    names
}
