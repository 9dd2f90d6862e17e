// src/session/mod.rs

//! Command session
//!
//! A `Session` owns everything one pkgctl process needs across commands:
//! the collaborators, the global options, the latched repository set, the
//! resolvable pool and the system lock. Each command goes through the same
//! lifecycle:
//!
//! ```text
//! Idle -> OptionsParsed -> HelpRequested ----------------> Completed
//!                       -> Validated -> Executing -> Completed | Failed
//! ```
//!
//! In shell mode `reset_for_next_shell_command` takes the session back to
//! `Idle`. Per-command state is cleared; the repository, resolvable and
//! target latches survive unless `[shell] reload_after_repo_changes` asks
//! for them to be dropped after repository changes.

mod options;
mod shell;

pub use options::{GlobalOptions, parse_repo_uri};
pub use shell::{run_shell, tokenize};

use crate::cli::Command;
use crate::commands;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exit_code::ExitCode;
use crate::lock::SystemLock;
use crate::output::Output;
use crate::progress::{self, ProgressTracker};
use crate::prompt::{Prompt, StdinPrompt};
use crate::repository::{
    ActiveRepoSet, FailureScope, InitRequest, LocalMetadataService, MetadataService,
    RefreshEngine, RepoSetInitializer, RepoStore, SqliteRepoStore,
};
use crate::resolvable::{
    LoadOptions, Resolution, ResolvableLoader, ResolvablePool, SimpleSolver, Solver, SqliteTarget,
    SystemStatus, Target,
};
use std::rc::Rc;
use tracing::{debug, error, info};

/// What a step asks the caller to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Continue,
    ShowHelpAndExit,
    ExitWithCode(ExitCode),
}

/// Lifecycle of the current command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    OptionsParsed,
    HelpRequested,
    Validated,
    Executing,
    Completed,
    Failed,
}

/// Per-command state
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub lifecycle: Lifecycle,
    pub command: Option<Command>,
    pub exit_code: ExitCode,
    pub help_requested: bool,
    /// Running inside `pkgctl shell`
    pub in_shell: bool,
    /// Skip `--plus-repo` repositories for this command
    pub ignore_plus_repos: bool,
}

impl SessionState {
    /// Raise the exit code unless an earlier step already set one
    pub fn flag(&mut self, code: ExitCode) {
        if self.exit_code == ExitCode::Ok {
            self.exit_code = code;
        }
    }

    fn reset_command(&mut self) {
        *self = SessionState {
            in_shell: self.in_shell,
            ..Default::default()
        };
    }
}

/// External collaborators of a session
pub struct Collaborators {
    pub store: Box<dyn RepoStore>,
    pub metadata: Box<dyn MetadataService>,
    pub target: Box<dyn Target>,
    pub prompt: Box<dyn Prompt>,
    pub progress: Box<dyn ProgressTracker>,
    pub solver: Box<dyn Solver>,
}

impl Collaborators {
    /// On-disk collaborators for the managed root
    pub fn local(options: &GlobalOptions, config: &Config) -> Result<Self> {
        let paths = options.store_paths(config);
        info!("Repository store at {}", paths.repos_db().display());

        Ok(Self {
            store: Box::new(SqliteRepoStore::open_or_empty(&paths.repos_db())?),
            target: Box::new(SqliteTarget::new(paths.target_db())),
            metadata: Box::new(LocalMetadataService::new(
                paths,
                config.main.metadata_expire(),
            )),
            prompt: Box::new(StdinPrompt::new(options.non_interactive)),
            progress: progress::for_environment(
                options.verbosity == crate::output::Verbosity::Quiet,
                options.machine_readable,
            ),
            solver: Box::new(SimpleSolver),
        })
    }
}

/// Refresh engine over the session's collaborators
fn refresh_engine<'a>(
    collab: &'a Collaborators,
    out: &'a Output,
    config: &Config,
) -> RefreshEngine<'a> {
    RefreshEngine::new(
        collab.metadata.as_ref(),
        collab.prompt.as_ref(),
        collab.progress.as_ref(),
        out,
    )
    .with_prompt_timeout(config.main.prompt_timeout())
}

/// Orchestrates commands over one set of collaborators
pub struct Session {
    options: GlobalOptions,
    config: Config,
    out: Output,
    collab: Collaborators,
    state: SessionState,
    initializer: RepoSetInitializer,
    loader: ResolvableLoader,
    pool: ResolvablePool,
    /// Solver view of the pool as of the last `prepare`
    status: SystemStatus,
    target_ready: bool,
    lock: Option<SystemLock>,
    euid_root: bool,
}

impl Session {
    pub fn new(options: GlobalOptions, config: Config, out: Output, collab: Collaborators) -> Self {
        let escalation = config.refresh.escalate;
        Self {
            options,
            config,
            out,
            collab,
            state: SessionState::default(),
            initializer: RepoSetInitializer::new(escalation),
            loader: ResolvableLoader::new(),
            pool: ResolvablePool::new(),
            status: SystemStatus::default(),
            target_ready: false,
            lock: None,
            euid_root: nix::unistd::geteuid().is_root(),
        }
    }

    /// Override the effective-user check
    pub fn with_privileges(mut self, root: bool) -> Self {
        self.euid_root = root;
        self
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output(&self) -> &Output {
        &self.out
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn store(&self) -> &dyn RepoStore {
        self.collab.store.as_ref()
    }

    pub fn metadata(&self) -> &dyn MetadataService {
        self.collab.metadata.as_ref()
    }

    pub fn prompt(&self) -> &dyn Prompt {
        self.collab.prompt.as_ref()
    }

    pub fn pool(&self) -> &ResolvablePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ResolvablePool {
        &mut self.pool
    }

    pub fn target(&self) -> &dyn Target {
        self.collab.target.as_ref()
    }

    pub fn target_mut(&mut self) -> &mut dyn Target {
        self.collab.target.as_mut()
    }

    pub fn initializer(&self) -> &RepoSetInitializer {
        &self.initializer
    }

    pub fn loader(&self) -> &ResolvableLoader {
        &self.loader
    }

    /// Whether failures may disable repositories and mutations are allowed
    pub fn may_write(&self) -> bool {
        self.euid_root || self.options.root_changed
    }

    pub fn engine(&self) -> RefreshEngine<'_> {
        refresh_engine(&self.collab, &self.out, &self.config)
    }

    pub fn enter_shell(&mut self) {
        self.state.in_shell = true;
    }

    /// Run one command through the full lifecycle
    pub fn run_workflow(&mut self, command: Command) -> ExitCode {
        self.state.command = Some(command.clone());
        self.advance(Lifecycle::OptionsParsed);

        match self.validate(&command) {
            ControlSignal::Continue => self.advance(Lifecycle::Validated),
            signal => return self.handle_signal(signal),
        }

        self.advance(Lifecycle::Executing);
        let code = match commands::dispatch(self, &command) {
            Ok(()) => self.state.exit_code,
            Err(e) => {
                self.report_failure(&e);
                e.exit_code()
            }
        };
        self.state.exit_code = code;

        if code.is_success() {
            self.advance(Lifecycle::Completed);
        } else {
            self.advance(Lifecycle::Failed);
        }

        if self.state.in_shell
            && self.config.shell.reload_after_repo_changes
            && command.changes_repositories()
        {
            self.invalidate_latches();
        }

        code
    }

    /// Finish a command that ended while its options were parsed
    pub fn handle_signal(&mut self, signal: ControlSignal) -> ExitCode {
        if self.state.lifecycle == Lifecycle::Idle {
            self.advance(Lifecycle::OptionsParsed);
        }
        match signal {
            ControlSignal::Continue => ExitCode::Ok,
            ControlSignal::ShowHelpAndExit => {
                self.state.help_requested = true;
                self.advance(Lifecycle::HelpRequested);
                self.advance(Lifecycle::Completed);
                ExitCode::Ok
            }
            ControlSignal::ExitWithCode(code) => {
                self.state.exit_code = code;
                self.advance(Lifecycle::Failed);
                code
            }
        }
    }

    /// Privilege, plus-repository and lock checks before any collaborator call
    fn validate(&mut self, command: &Command) -> ControlSignal {
        if command.needs_privileges() && !self.may_write() {
            self.out.report(&Error::PrivilegeError(format!(
                "Root privileges are required for '{}'.",
                command.name()
            )));
            return ControlSignal::ExitWithCode(ExitCode::Privileges);
        }

        if command.ignores_plus_repos() && !self.options.plus_repos.is_empty() {
            self.out.warning(format!(
                "The --plus-repo option has no effect here, ignoring it for '{}'.",
                command.name()
            ));
            self.state.ignore_plus_repos = true;
        }

        if command.needs_lock()
            && self.lock.is_none()
            && let Err(e) = self.acquire_lock()
        {
            self.out.report(&e);
            return ControlSignal::ExitWithCode(e.exit_code());
        }

        ControlSignal::Continue
    }

    fn acquire_lock(&mut self) -> Result<()> {
        let path = SystemLock::path_for_root(&self.options.root);
        match SystemLock::acquire(&path) {
            Ok(lock) => {
                self.lock = Some(lock);
                Ok(())
            }
            Err(Error::LibraryBusy(path)) => {
                if let Some(pid) = SystemLock::holder_pid(&path) {
                    self.out.error(format!("The lock is held by process {}.", pid));
                }
                Err(Error::LibraryBusy(path))
            }
            // An unprivileged listing cannot create the lock file; carry on
            Err(e) if !self.may_write() => {
                debug!("Running without system lock: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn report_failure(&self, err: &Error) {
        if err.is_bug() {
            error!("Unexpected failure: {:?}", err);
            self.out.error("Unexpected failure. Please report this as a bug.");
        }
        self.out.report(err);
    }

    fn advance(&mut self, lifecycle: Lifecycle) {
        debug!("Session: {:?} -> {:?}", self.state.lifecycle, lifecycle);
        self.state.lifecycle = lifecycle;
    }

    /// Build (or reuse) the active repository set
    pub fn init_repos(&mut self, selectors: &[String]) -> Result<Rc<ActiveRepoSet>> {
        let plus_repos = if self.state.ignore_plus_repos {
            Vec::new()
        } else {
            self.options.plus_repos.clone()
        };
        let request = InitRequest {
            selectors: selectors.to_vec(),
            plus_repos,
            no_refresh: self.options.no_refresh,
            disable_repositories: self.options.disable_repositories,
            may_write: self.may_write(),
        };

        let engine = refresh_engine(&self.collab, &self.out, &self.config);
        let active =
            self.initializer
                .initialize(self.collab.store.as_ref(), &engine, &self.out, &request)?;

        if active.summary.scope(self.config.refresh.escalate) == FailureScope::Partial {
            self.state.flag(ExitCode::LibraryError);
        }
        Ok(active)
    }

    /// Open the installed-system database once per process
    pub fn init_target(&mut self) -> Result<()> {
        if self.target_ready {
            return Ok(());
        }
        self.collab.target.initialize()?;
        self.target_ready = true;
        Ok(())
    }

    /// Fill the resolvable pool (once per process)
    pub fn load_resolvables(&mut self, active: &ActiveRepoSet) -> Result<()> {
        let engine = refresh_engine(&self.collab, &self.out, &self.config);
        let options = LoadOptions {
            disable_system_resolvables: self.options.disable_system_resolvables,
        };
        let summary = self.loader.load_all(
            active,
            &engine,
            self.collab.metadata.as_ref(),
            self.collab.target.as_ref(),
            &mut self.pool,
            &self.out,
            options,
        )?;
        if summary.target_error.is_some() {
            self.state.flag(ExitCode::LibraryError);
        }
        Ok(())
    }

    /// Common prefix of every package and query workflow: repositories,
    /// target, pool, then a solver pass over the unmarked pool
    ///
    /// A target that cannot be opened is reported and the pool is still
    /// filled from the repositories.
    pub fn prepare(&mut self, selectors: &[String]) -> Result<Rc<ActiveRepoSet>> {
        let active = self.init_repos(selectors)?;
        if let Err(e) = self.init_target() {
            self.out.report(&e);
            self.state.flag(ExitCode::LibraryError);
        }
        self.load_resolvables(&active)?;

        self.status = self.collab.solver.status(&self.pool);
        debug!(
            "Solver status: {} updates, {} needed patches",
            self.status.updates.len(),
            self.status.needed_patches.len()
        );
        Ok(active)
    }

    /// Solver view computed by the last `prepare`
    pub fn status(&self) -> SystemStatus {
        self.status.clone()
    }

    /// Complete the current marks into a change set
    pub fn resolve(&mut self) -> Result<Resolution> {
        self.collab.solver.resolve(&mut self.pool)
    }

    /// Hand a change set to the target
    pub fn commit(&mut self, resolution: &Resolution) -> Result<()> {
        let Collaborators { solver, target, .. } = &mut self.collab;
        solver.commit(resolution, target.as_mut())
    }

    /// Drop the repository and resolvable latches
    pub fn invalidate_latches(&mut self) {
        info!("Reloading repositories and resolvables for the next command");
        self.initializer.invalidate();
        self.loader.invalidate();
    }

    /// Clear per-command state before the next shell command
    pub fn reset_for_next_shell_command(&mut self) {
        self.state.reset_command();
        self.pool.clear_marks();
        self.status = SystemStatus::default();
        debug!("Session reset for the next command");
    }

    /// Process cleanup: temporary repositories and the system lock
    pub fn finish(&mut self) {
        self.initializer
            .cleanup(self.collab.store.as_ref(), self.collab.metadata.as_ref());
        self.lock = None;
    }
}
