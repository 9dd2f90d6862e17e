// src/repository/refresh.rs

//! Per-repository refresh state machine
//!
//! ```text
//! NeedCheck -> Refreshing -> CacheBuilding -> Done
//!                  |              |
//!                  +--------------+--> Disabled
//! ```
//!
//! The engine decides whether raw metadata needs a refresh, performs it,
//! then builds the resolvable cache. Failures stay with the repository they
//! happened in. With write access to the system (root, or a redirected
//! root directory) a failing repository is disabled for the rest of the
//! command. Without it the failure is informational and the repository
//! stays enabled, since the user simply cannot write the cache.

use super::metadata::{BuildPolicy, MetadataError, MetadataService, RefreshCheck, RefreshPolicy};
use crate::db::models::RepositoryRecord;
use crate::error::Error;
use crate::output::{Output, Verbosity};
use crate::progress::ProgressTracker;
use crate::prompt::{Prompt, PromptAction};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// State of one repository inside the refresh state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    NeedCheck,
    Refreshing,
    CacheBuilding,
    Done,
    Disabled,
}

/// Per-repository result, never persisted beyond the current command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    UpToDate,
    Refreshed,
    CheckDelayed,
    DisabledDueToError,
    /// Not refreshed: changeable media without force, indeterminate check,
    /// or refresh not requested
    Skipped,
    /// Failed without write access; left enabled with stale metadata
    StaleNeedsPrivileges,
}

/// Refresh failure, carrying the user-facing cause
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Problem retrieving files from '{repo}'.")]
    Media { repo: String, detail: String },

    #[error("No URIs defined for '{repo}'.")]
    NoUrl {
        repo: String,
        alias: String,
        file_path: Option<PathBuf>,
    },

    #[error("No alias defined for this repository.")]
    NoAlias,

    #[error("Repository '{repo}' is invalid.")]
    InvalidRepository { repo: String, detail: String },

    #[error("Error retrieving metadata for '{repo}':")]
    Other { repo: String, detail: String },

    #[error("Aborted by user")]
    Aborted,
}

impl RefreshError {
    fn from_metadata(repo: &RepositoryRecord, err: MetadataError) -> Self {
        let name = repo.display_name().to_string();
        match err {
            MetadataError::Media(detail) => RefreshError::Media { repo: name, detail },
            MetadataError::MediaChangeRequired(media) => RefreshError::Media {
                repo: name,
                detail: format!("Medium {} is not inserted.", media),
            },
            MetadataError::NoUrl => RefreshError::NoUrl {
                repo: name,
                alias: repo.alias.clone(),
                file_path: repo.file_path.clone(),
            },
            MetadataError::NoAlias => RefreshError::NoAlias,
            MetadataError::InvalidRepository(detail) => {
                RefreshError::InvalidRepository { repo: name, detail }
            }
            MetadataError::Aborted => RefreshError::Aborted,
            other => RefreshError::Other {
                repo: name,
                detail: other.to_string(),
            },
        }
    }

    /// Underlying reason, printed below the message
    pub fn detail(&self) -> Option<&str> {
        match self {
            RefreshError::Media { detail, .. }
            | RefreshError::InvalidRepository { detail, .. }
            | RefreshError::Other { detail, .. } => Some(detail),
            _ => None,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            RefreshError::Media { .. } => {
                Some("Please see the above error message for a hint.".to_string())
            }
            RefreshError::NoUrl {
                alias,
                file_path: Some(file),
                ..
            } => Some(format!(
                "Please add one or more base URI (baseurl=URI) entries to {} for repository '{}'.",
                file.display(),
                alias
            )),
            RefreshError::NoUrl { .. } => None,
            RefreshError::NoAlias => Some("Please file a bug report about this.".to_string()),
            RefreshError::InvalidRepository { .. } => Some(
                "Please check if the URIs defined for this repository are pointing to a valid repository."
                    .to_string(),
            ),
            RefreshError::Other { .. } | RefreshError::Aborted => None,
        }
    }
}

/// Cache build failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Raw metadata is malformed; a data-quality problem, not a bug
    #[error("Error parsing metadata for '{repo}':")]
    Parse { repo: String, detail: String },

    #[error("Repository metadata for '{repo}' not found in local cache.")]
    MetadataNotCached { repo: String },

    #[error("Error building the cache:")]
    Other { repo: String, detail: String },
}

impl CacheError {
    fn from_metadata(repo: &RepositoryRecord, err: MetadataError) -> Self {
        let name = repo.display_name().to_string();
        match err {
            MetadataError::Parse(detail) => CacheError::Parse { repo: name, detail },
            MetadataError::NotCached => CacheError::MetadataNotCached { repo: name },
            other => CacheError::Other {
                repo: name,
                detail: other.to_string(),
            },
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            CacheError::Parse { detail, .. } | CacheError::Other { detail, .. } => Some(detail),
            CacheError::MetadataNotCached { .. } => None,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            CacheError::Parse { .. } => Some(
                "This may be caused by invalid metadata in the repository, or by a bug in the metadata parser. Please check the repository metadata."
                    .to_string(),
            ),
            CacheError::MetadataNotCached { .. } => {
                Some("Please file a bug report about this.".to_string())
            }
            CacheError::Other { .. } => None,
        }
    }
}

/// Options of an explicit refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    pub force_download: bool,
    pub force_build: bool,
    pub download_only: bool,
    pub build_only: bool,
}

/// Progress of one repository through the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRefresh {
    pub alias: String,
    pub state: RefreshState,
    pub outcome: Option<RefreshOutcome>,
}

impl RepoRefresh {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            state: RefreshState::NeedCheck,
            outcome: None,
        }
    }

    fn advance(&mut self, state: RefreshState) {
        debug!("Repository '{}': {:?} -> {:?}", self.alias, self.state, state);
        self.state = state;
    }

    pub fn is_done(&self) -> bool {
        self.state == RefreshState::Done
    }

    pub fn is_disabled(&self) -> bool {
        self.state == RefreshState::Disabled
    }

    /// Whether the repository failed (disabled, or stale without privileges)
    pub fn failed(&self) -> bool {
        matches!(
            self.outcome,
            Some(RefreshOutcome::DisabledDueToError) | Some(RefreshOutcome::StaleNeedsPrivileges)
        )
    }
}

/// Drives repositories through refresh and cache building
pub struct RefreshEngine<'a> {
    metadata: &'a dyn MetadataService,
    prompt: &'a dyn Prompt,
    progress: &'a dyn ProgressTracker,
    out: &'a Output,
    prompt_timeout: Option<Duration>,
    ignore_delay: bool,
}

impl<'a> RefreshEngine<'a> {
    pub fn new(
        metadata: &'a dyn MetadataService,
        prompt: &'a dyn Prompt,
        progress: &'a dyn ProgressTracker,
        out: &'a Output,
    ) -> Self {
        Self {
            metadata,
            prompt,
            progress,
            out,
            prompt_timeout: None,
            ignore_delay: false,
        }
    }

    /// Timeout of the media abort/retry/ignore prompt
    pub fn with_prompt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Ignore the up-to-date check delay (explicit refresh)
    pub fn ignoring_delay(mut self, ignore: bool) -> Self {
        self.ignore_delay = ignore;
        self
    }

    /// Ask each base URI in turn whether the metadata changed
    ///
    /// The first URI giving an answer decides. `None` means every URI
    /// failed and the refresh requirement is unknown.
    pub fn check_needs_refresh(
        &self,
        repo: &RepositoryRecord,
        force_download: bool,
        ignore_delay: bool,
    ) -> Option<RefreshCheck> {
        if force_download {
            return Some(RefreshCheck::NeedsRefresh);
        }

        let policy = if ignore_delay {
            RefreshPolicy::IfNeededIgnoreDelay
        } else {
            RefreshPolicy::IfNeeded
        };

        for url in &repo.base_urls {
            match self.metadata.check_if_refresh_needed(repo, url, policy) {
                Ok(check) => return Some(check),
                Err(e) => debug!("Up-to-date check of '{}' at {} failed: {}", repo.alias, url, e),
            }
        }
        None
    }

    /// Refresh raw metadata if needed (or forced)
    pub fn refresh(
        &self,
        repo: &RepositoryRecord,
        force_download: bool,
    ) -> Result<RefreshOutcome, RefreshError> {
        if repo.is_changeable_media() && !force_download {
            self.out.info_at(
                Verbosity::High,
                format!(
                    "Skipping repository '{}' on changeable media. Use the force option to refresh it.",
                    repo.display_name()
                ),
            );
            return Ok(RefreshOutcome::Skipped);
        }

        // Let the collaborator report a missing alias or URI
        if repo.alias.is_empty() || repo.base_urls.is_empty() {
            return self.fetch(repo, force_download);
        }

        match self.check_needs_refresh(repo, force_download, self.ignore_delay) {
            None => {
                debug!("Refresh requirement of '{}' is indeterminate", repo.alias);
                Ok(RefreshOutcome::Skipped)
            }
            Some(RefreshCheck::UpToDate) => {
                if self.ignore_delay {
                    self.out.info(format!(
                        "Repository '{}' is up to date.",
                        repo.display_name()
                    ));
                }
                Ok(RefreshOutcome::UpToDate)
            }
            Some(RefreshCheck::CheckDelayed) => {
                self.out.info_at(
                    Verbosity::High,
                    format!(
                        "The up-to-date check of '{}' has been delayed.",
                        repo.display_name()
                    ),
                );
                Ok(RefreshOutcome::CheckDelayed)
            }
            Some(RefreshCheck::NeedsRefresh) => self.fetch(repo, force_download),
        }
    }

    fn fetch(&self, repo: &RepositoryRecord, force: bool) -> Result<RefreshOutcome, RefreshError> {
        let policy = if force {
            RefreshPolicy::Forced
        } else if self.ignore_delay {
            RefreshPolicy::IfNeededIgnoreDelay
        } else {
            RefreshPolicy::IfNeeded
        };
        let message = format!("Retrieving repository '{}' metadata", repo.display_name());

        loop {
            self.progress.start(&message);
            match self.metadata.refresh_metadata(repo, policy) {
                Ok(()) => {
                    self.progress.finish_with_message(&message);
                    return Ok(RefreshOutcome::Refreshed);
                }
                Err(MetadataError::MediaChangeRequired(media)) => {
                    self.progress.finish_with_error(&message);
                    let question = format!(
                        "Please insert medium [{}] of repository '{}'. (a)bort, (r)etry or (i)gnore?",
                        media,
                        repo.display_name()
                    );
                    match self.prompt.abort_retry_ignore(
                        &question,
                        self.prompt_timeout,
                        PromptAction::Ignore,
                    ) {
                        PromptAction::Retry => continue,
                        PromptAction::Abort => return Err(RefreshError::Aborted),
                        PromptAction::Ignore => {
                            return Err(RefreshError::from_metadata(
                                repo,
                                MetadataError::MediaChangeRequired(media),
                            ));
                        }
                    }
                }
                Err(e) => {
                    self.progress.finish_with_error(&message);
                    return Err(RefreshError::from_metadata(repo, e));
                }
            }
        }
    }

    /// Build the resolvable cache from raw metadata
    pub fn build_cache(&self, repo: &RepositoryRecord, force_build: bool) -> Result<(), CacheError> {
        let policy = if force_build {
            BuildPolicy::Forced
        } else {
            BuildPolicy::IfNeeded
        };
        let message = format!("Building repository '{}' cache", repo.display_name());

        self.progress.start(&message);
        match self.metadata.build_cache(repo, policy) {
            Ok(()) => {
                self.progress.finish_with_message(&message);
                Ok(())
            }
            Err(e) => {
                self.progress.finish_with_error(&message);
                Err(CacheError::from_metadata(repo, e))
            }
        }
    }

    /// Refresh and cache one repository for the working set of a command
    ///
    /// `may_write` selects the privileged branch. Returns `Err` only for
    /// failures that must stop the whole command: a user abort, or metadata
    /// vanishing from the cache right after a successful refresh.
    pub fn auto_refresh(
        &self,
        repo: &mut RepositoryRecord,
        may_write: bool,
        do_refresh: bool,
    ) -> Result<RepoRefresh, Error> {
        let mut track = RepoRefresh::new(&repo.alias);
        let mut refreshed = false;

        if do_refresh {
            track.advance(RefreshState::Refreshing);
            match self.refresh(repo, false) {
                Ok(outcome) => {
                    refreshed = matches!(
                        outcome,
                        RefreshOutcome::Refreshed
                            | RefreshOutcome::UpToDate
                            | RefreshOutcome::CheckDelayed
                    );
                    track.outcome = Some(outcome);
                }
                Err(RefreshError::Aborted) => return Err(Error::UserAbort),
                Err(e) if may_write => {
                    self.report_refresh_error(&e, true);
                    self.disable(repo, &mut track);
                    return Ok(track);
                }
                Err(e) => {
                    self.report_refresh_error(&e, false);
                    self.out.info(format!(
                        "Repository '{}' is out-of-date. You can run 'pkgctl refresh' as root to update it.",
                        repo.display_name()
                    ));
                    track.outcome = Some(RefreshOutcome::StaleNeedsPrivileges);
                    track.advance(RefreshState::Done);
                    return Ok(track);
                }
            }
        }

        track.advance(RefreshState::CacheBuilding);
        match self.build_cache(repo, false) {
            Ok(()) => {}
            Err(CacheError::MetadataNotCached { repo: name }) if refreshed => {
                self.out.error(format!(
                    "Repository metadata for '{}' not found in local cache.",
                    name
                ));
                return Err(Error::InternalInconsistency(format!(
                    "metadata of '{}' missing from the local cache after a successful refresh",
                    repo.alias
                )));
            }
            Err(e) if may_write => {
                self.report_cache_error(&e, true);
                self.disable(repo, &mut track);
                return Ok(track);
            }
            Err(e) => {
                self.report_cache_error(&e, false);
                self.out.info(format!(
                    "The metadata cache needs to be built for the '{}' repository. You can run 'pkgctl refresh' as root to do this.",
                    repo.display_name()
                ));
                track.outcome = Some(RefreshOutcome::StaleNeedsPrivileges);
            }
        }

        if track.outcome.is_none() {
            track.outcome = Some(RefreshOutcome::Skipped);
        }
        track.advance(RefreshState::Done);
        Ok(track)
    }

    /// Explicit refresh of one repository (the refresh command)
    ///
    /// Errors are reported here; the caller only counts them. Aborts and
    /// internal inconsistencies are returned.
    pub fn refresh_repo(
        &self,
        repo: &RepositoryRecord,
        options: &RefreshOptions,
    ) -> Result<RepoRefresh, Error> {
        let mut track = RepoRefresh::new(&repo.alias);
        let mut refreshed = false;

        if !options.build_only {
            track.advance(RefreshState::Refreshing);
            match self.refresh(repo, options.force_download) {
                Ok(RefreshOutcome::Skipped) if repo.is_changeable_media() => {
                    track.outcome = Some(RefreshOutcome::Skipped);
                    track.advance(RefreshState::Done);
                    return Ok(track);
                }
                Ok(outcome) => {
                    refreshed = outcome != RefreshOutcome::Skipped;
                    track.outcome = Some(outcome);
                }
                Err(RefreshError::Aborted) => return Err(Error::UserAbort),
                Err(e) => {
                    self.report_refresh_error(&e, true);
                    track.outcome = Some(RefreshOutcome::DisabledDueToError);
                    track.advance(RefreshState::Disabled);
                    return Ok(track);
                }
            }
        }

        if !options.download_only {
            track.advance(RefreshState::CacheBuilding);
            match self.build_cache(repo, options.force_build) {
                Ok(()) => {}
                Err(CacheError::MetadataNotCached { .. }) if refreshed => {
                    return Err(Error::InternalInconsistency(format!(
                        "metadata of '{}' missing from the local cache after a successful refresh",
                        repo.alias
                    )));
                }
                Err(e) => {
                    self.report_cache_error(&e, true);
                    track.outcome = Some(RefreshOutcome::DisabledDueToError);
                    track.advance(RefreshState::Disabled);
                    return Ok(track);
                }
            }
        }

        if track.outcome.is_none() {
            track.outcome = Some(RefreshOutcome::Refreshed);
        }
        track.advance(RefreshState::Done);
        Ok(track)
    }

    fn disable(&self, repo: &mut RepositoryRecord, track: &mut RepoRefresh) {
        self.out.warning_at(
            Verbosity::Quiet,
            format!(
                "Disabling repository '{}' because of the above error.",
                repo.display_name()
            ),
        );
        repo.enabled = false;
        track.outcome = Some(RefreshOutcome::DisabledDueToError);
        track.advance(RefreshState::Disabled);
    }

    fn report_refresh_error(&self, err: &RefreshError, as_error: bool) {
        self.report(&err.to_string(), err.detail(), err.hint().as_deref(), as_error);
    }

    fn report_cache_error(&self, err: &CacheError, as_error: bool) {
        self.report(&err.to_string(), err.detail(), err.hint().as_deref(), as_error);
    }

    fn report(&self, message: &str, detail: Option<&str>, hint: Option<&str>, as_error: bool) {
        if as_error {
            self.out.error(message);
            if let Some(detail) = detail {
                self.out.error(detail);
            }
            if let Some(hint) = hint {
                self.out.hint(hint);
            }
        } else {
            self.out.info(message);
            if let Some(detail) = detail {
                self.out.info(detail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MessageKind;
    use crate::progress::SilentProgress;
    use crate::prompt::ScriptedPrompt;
    use crate::repository::fake::FakeMetadata;
    use url::Url;

    fn repo(alias: &str, urls: &[&str]) -> RepositoryRecord {
        let mut repo =
            RepositoryRecord::new(alias, urls.iter().map(|u| Url::parse(u).unwrap()).collect());
        repo.autorefresh = true;
        repo
    }

    struct Harness {
        metadata: FakeMetadata,
        prompt: ScriptedPrompt,
        progress: SilentProgress,
        out: Output,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                metadata: FakeMetadata::default(),
                prompt: ScriptedPrompt::new(),
                progress: SilentProgress,
                out: Output::captured(Verbosity::Normal),
            }
        }

        fn engine(&self) -> RefreshEngine<'_> {
            RefreshEngine::new(&self.metadata, &self.prompt, &self.progress, &self.out)
        }
    }

    #[test]
    fn test_check_stops_at_first_usable_url() {
        let h = Harness::new();
        h.metadata.check.borrow_mut().extend([
            Err(MetadataError::Media("down".into())),
            Ok(RefreshCheck::UpToDate),
            Ok(RefreshCheck::NeedsRefresh),
        ]);
        let r = repo("a", &["http://1.example.com/", "http://2.example.com/", "http://3.example.com/"]);

        assert_eq!(h.engine().check_needs_refresh(&r, false, false), Some(RefreshCheck::UpToDate));
        assert_eq!(h.metadata.checks.get(), 2);
    }

    #[test]
    fn test_check_indeterminate_when_all_urls_fail() {
        let h = Harness::new();
        h.metadata
            .check
            .borrow_mut()
            .extend((0..4).map(|_| Err(MetadataError::Media("down".into()))));
        let r = repo("a", &["http://1.example.com/", "http://2.example.com/"]);

        assert_eq!(h.engine().check_needs_refresh(&r, false, false), None);
        assert_eq!(h.engine().refresh(&r, false), Ok(RefreshOutcome::Skipped));
        assert_eq!(h.metadata.fetches.get(), 0);
    }

    #[test]
    fn test_changeable_media_is_never_fetched_without_force() {
        let h = Harness::new();
        let dvd = repo("dvd", &["dvd:///media/dvd"]);

        for _ in 0..3 {
            assert_eq!(h.engine().refresh(&dvd, false), Ok(RefreshOutcome::Skipped));
        }
        assert_eq!(h.metadata.fetches.get(), 0);
        assert_eq!(h.metadata.checks.get(), 0);

        assert_eq!(h.engine().refresh(&dvd, true), Ok(RefreshOutcome::Refreshed));
        assert_eq!(h.metadata.fetches.get(), 1);
    }

    #[test]
    fn test_refresh_maps_errors_to_user_messages() {
        let h = Harness::new();
        h.metadata
            .refresh
            .borrow_mut()
            .push(Err(MetadataError::InvalidRepository("garbage".into())));
        let r = repo("a", &["http://1.example.com/"]);

        let err = h.engine().refresh(&r, false).unwrap_err();
        assert_eq!(err.to_string(), "Repository 'a' is invalid.");
        assert!(err.hint().unwrap().contains("valid repository"));
    }

    #[test]
    fn test_no_url_hint_names_definition_file() {
        let h = Harness::new();
        h.metadata.refresh.borrow_mut().push(Err(MetadataError::NoUrl));
        let mut r = repo("a", &[]);
        r.file_path = Some(PathBuf::from("/etc/pkgctl/repos.d/a.repo"));

        let err = h.engine().refresh(&r, false).unwrap_err();
        assert_eq!(err.to_string(), "No URIs defined for 'a'.");
        assert!(err.hint().unwrap().contains("/etc/pkgctl/repos.d/a.repo"));
    }

    #[test]
    fn test_media_prompt_retry_then_abort() {
        let mut h = Harness::new();
        h.prompt = ScriptedPrompt::new().with_actions([PromptAction::Retry, PromptAction::Abort]);
        h.metadata.refresh.borrow_mut().extend([
            Err(MetadataError::MediaChangeRequired("cd:///".into())),
            Err(MetadataError::MediaChangeRequired("cd:///".into())),
        ]);
        let cd = repo("cd", &["cd:///media/cd"]);

        assert_eq!(h.engine().refresh(&cd, true), Err(RefreshError::Aborted));
        assert_eq!(h.metadata.fetches.get(), 2);
        assert_eq!(h.prompt.asked().len(), 2);
    }

    #[test]
    fn test_privileged_failure_disables() {
        let h = Harness::new();
        h.metadata
            .refresh
            .borrow_mut()
            .push(Err(MetadataError::Media("unreachable".into())));
        let mut r = repo("bad", &["http://bad.example.com/"]);

        let track = h.engine().auto_refresh(&mut r, true, true).unwrap();
        assert!(track.is_disabled());
        assert_eq!(track.outcome, Some(RefreshOutcome::DisabledDueToError));
        assert!(!r.enabled);
        assert_eq!(h.metadata.builds.get(), 0);
        assert!(h.out.contains(MessageKind::Error, "Problem retrieving files from 'bad'."));
        assert!(h.out.contains(MessageKind::Warning, "Disabling repository 'bad'"));
    }

    #[test]
    fn test_unprivileged_failure_is_informational() {
        let h = Harness::new();
        h.metadata
            .refresh
            .borrow_mut()
            .push(Err(MetadataError::Media("unreachable".into())));
        let mut r = repo("bad", &["http://bad.example.com/"]);

        let track = h.engine().auto_refresh(&mut r, false, true).unwrap();
        assert!(track.is_done());
        assert_eq!(track.outcome, Some(RefreshOutcome::StaleNeedsPrivileges));
        assert!(r.enabled);
        assert!(h.out.contains(MessageKind::Info, "is out-of-date"));
        assert!(!h.out.messages().iter().any(|m| m.kind == MessageKind::Error));
    }

    #[test]
    fn test_unprivileged_cache_failure_keeps_repo_enabled() {
        let h = Harness::new();
        h.metadata
            .build
            .borrow_mut()
            .push(Err(MetadataError::Other("read-only".into())));
        let mut r = repo("a", &["http://a.example.com/"]);

        let track = h.engine().auto_refresh(&mut r, false, false).unwrap();
        assert!(r.enabled);
        assert_eq!(track.outcome, Some(RefreshOutcome::StaleNeedsPrivileges));
        assert!(h.out.contains(MessageKind::Info, "metadata cache needs to be built"));
    }

    #[test]
    fn test_not_cached_after_refresh_escalates() {
        let h = Harness::new();
        h.metadata.build.borrow_mut().push(Err(MetadataError::NotCached));
        let mut r = repo("a", &["http://a.example.com/"]);

        let err = h.engine().auto_refresh(&mut r, true, true).unwrap_err();
        assert!(matches!(err, Error::InternalInconsistency(_)));
    }

    #[test]
    fn test_not_cached_without_refresh_is_ordinary_failure() {
        let h = Harness::new();
        h.metadata.build.borrow_mut().push(Err(MetadataError::NotCached));
        let mut r = repo("a", &["http://a.example.com/"]);

        let track = h.engine().auto_refresh(&mut r, true, false).unwrap();
        assert!(track.is_disabled());
        assert_eq!(h.metadata.fetches.get(), 0);
    }

    #[test]
    fn test_parse_failure_is_data_quality_problem() {
        let h = Harness::new();
        h.metadata
            .build
            .borrow_mut()
            .push(Err(MetadataError::Parse("line 3".into())));
        let r = repo("a", &["http://a.example.com/"]);

        let err = h.engine().build_cache(&r, false).unwrap_err();
        assert_eq!(err.to_string(), "Error parsing metadata for 'a':");
        assert!(err.hint().unwrap().contains("invalid metadata"));
    }

    #[test]
    fn test_explicit_refresh_options() {
        let h = Harness::new();
        let r = repo("a", &["http://a.example.com/"]);

        let build_only = RefreshOptions {
            build_only: true,
            ..Default::default()
        };
        let track = h.engine().refresh_repo(&r, &build_only).unwrap();
        assert!(track.is_done());
        assert_eq!(h.metadata.fetches.get(), 0);
        assert_eq!(h.metadata.builds.get(), 1);

        let download_only = RefreshOptions {
            download_only: true,
            ..Default::default()
        };
        h.engine().refresh_repo(&r, &download_only).unwrap();
        assert_eq!(h.metadata.fetches.get(), 1);
        assert_eq!(h.metadata.builds.get(), 1);
    }

    #[test]
    fn test_explicit_refresh_reports_up_to_date() {
        let h = Harness::new();
        h.metadata.check.borrow_mut().push(Ok(RefreshCheck::UpToDate));
        let r = repo("a", &["http://a.example.com/"]);

        let engine = h.engine().ignoring_delay(true);
        let track = engine.refresh_repo(&r, &RefreshOptions::default()).unwrap();
        assert_eq!(track.outcome, Some(RefreshOutcome::UpToDate));
        assert!(h.out.contains(MessageKind::Info, "Repository 'a' is up to date."));
    }
}
