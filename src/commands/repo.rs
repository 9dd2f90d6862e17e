// src/commands/repo.rs
//! Repository management commands

use super::{table, yes_no};
use crate::cli::{AddRepoArgs, CleanArgs, ModifyRepoArgs, RefreshArgs, RenameRepoArgs, ReposArgs};
use crate::db::models::{RepoType, RepositoryRecord};
use crate::error::{Error, Result};
use crate::exit_code::ExitCode;
use crate::output::{Output, Verbosity};
use crate::repository::management::{
    AddRepoOptions, RepoChanges, RepoFilter, add_repositories_from_file, add_repository,
    export_repositories, modify_repository, tri_state,
};
use crate::repository::{
    FailureScope, MetadataError, MetadataService, RefreshOptions, RefreshSummary, locate,
    locate_many,
};
use crate::session::{Session, parse_repo_uri};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Resolve selectors against the store, failing on any miss
fn select_repositories(
    known: &[RepositoryRecord],
    selectors: &[String],
) -> Result<Vec<RepositoryRecord>> {
    if selectors.is_empty() {
        return Ok(known.to_vec());
    }
    let located = locate_many(selectors, known);
    if !located.unmatched.is_empty() {
        return Err(Error::InvalidSelectors(located.unmatched));
    }
    Ok(located.matched)
}

/// Stored repositories without the temporary ones of this process
fn persistent_repositories(session: &Session) -> Result<Vec<RepositoryRecord>> {
    let temporary = session.initializer().plus_repos();
    Ok(session
        .store()
        .repositories()?
        .into_iter()
        .filter(|repo| !temporary.iter().any(|t| t.alias == repo.alias))
        .collect())
}

/// Drop the local caches of a repository that goes away
fn forget_caches(metadata: &dyn MetadataService, repo: &RepositoryRecord) {
    if let Err(e) = metadata.clean_cache(repo) {
        debug!("Could not clean cache of '{}': {}", repo.alias, e);
    }
    if let Err(e) = metadata.clean_raw_metadata(repo) {
        debug!("Could not clean raw metadata of '{}': {}", repo.alias, e);
    }
}

fn print_details(out: &Output, repo: &RepositoryRecord) {
    let urls: Vec<String> = repo.base_urls.iter().map(|u| u.to_string()).collect();
    let lines = [
        ("Alias", repo.alias.clone()),
        ("Name", repo.name.clone()),
        ("URI", urls.join(", ")),
        ("Enabled", yes_no(repo.enabled)),
        ("Autorefresh", yes_no(repo.autorefresh)),
        ("Keep Packages", yes_no(repo.keep_packages)),
        ("Priority", repo.priority.to_string()),
        ("Type", repo.repo_type.to_string()),
        ("Service", repo.service.clone().unwrap_or_default()),
    ];
    for (label, value) in lines {
        out.data(format!("{:<14}: {}", label, value));
    }
}

/// List repositories
pub fn cmd_repos(session: &mut Session, args: &ReposArgs) -> Result<()> {
    info!("Listing repositories");
    let known = session.store().repositories()?;
    let out = session.output();

    if let Some(path) = &args.export {
        let exported = export_repositories(&known)?;
        fs::write(path, exported)
            .map_err(|e| Error::IoError(format!("Cannot write {}: {}", path.display(), e)))?;
        out.info(format!(
            "Repositories have been successfully exported to {}.",
            path.display()
        ));
        return Ok(());
    }

    if known.is_empty() {
        out.warning("No repositories defined.");
        out.hint("Use the 'pkgctl addrepo' command to add one or more repositories.");
        return Ok(());
    }

    // Numbers always refer to the full enumeration
    let selected = select_repositories(&known, &args.selectors)?;
    let numbered: Vec<(usize, &RepositoryRecord)> = selected
        .iter()
        .filter_map(|s| {
            known
                .iter()
                .position(|k| k.alias == s.alias)
                .map(|i| (i + 1, &known[i]))
        })
        .collect();

    if out.is_machine_readable() {
        let records: Vec<&RepositoryRecord> = numbered.iter().map(|(_, r)| *r).collect();
        out.data(serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if args.details {
        for (i, (_, repo)) in numbered.iter().enumerate() {
            if i > 0 {
                out.data("");
            }
            print_details(out, repo);
        }
        return Ok(());
    }

    let mut header = vec!["#", "Alias", "Name", "Enabled", "Refresh"];
    if args.priority {
        header.push("Priority");
    }
    if args.uri {
        header.push("URI");
    }
    let rows: Vec<Vec<String>> = numbered
        .iter()
        .map(|(number, repo)| {
            let mut row = vec![
                number.to_string(),
                repo.alias.clone(),
                repo.display_name().to_string(),
                yes_no(repo.enabled),
                yes_no(repo.autorefresh),
            ];
            if args.priority {
                row.push(repo.priority.to_string());
            }
            if args.uri {
                row.push(
                    repo.base_urls
                        .first()
                        .map(|u| u.to_string())
                        .unwrap_or_default(),
                );
            }
            row
        })
        .collect();

    for line in table(&header, &rows) {
        out.data(line);
    }
    Ok(())
}

/// Local path of a repository definition file given instead of a URI
fn repo_file_path(uri: &str) -> Option<&Path> {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    (path.ends_with(".repo") && !path.contains("://")).then(|| Path::new(path))
}

/// Add a repository, or every repository of a definition file
pub fn cmd_addrepo(session: &mut Session, args: &AddRepoArgs) -> Result<()> {
    let out = session.output();

    if args.alias.is_none()
        && let Some(path) = repo_file_path(&args.uri)
    {
        info!("Adding repositories from {}", path.display());
        let mut failed = false;
        for (alias, result) in add_repositories_from_file(session.store(), path)? {
            match result {
                Ok(repo) => out.info(format!(
                    "Repository '{}' successfully added",
                    repo.display_name()
                )),
                Err(e) => {
                    out.error(format!("Cannot add repository '{}':", alias));
                    out.report(&e);
                    failed = true;
                }
            }
        }
        if failed {
            session.state_mut().flag(ExitCode::LibraryError);
        }
        return Ok(());
    }

    let repo_type = args
        .repo_type
        .as_deref()
        .map(str::parse::<RepoType>)
        .transpose()?;
    let autorefresh = tri_state(out, args.refresh, args.no_refresh, "--refresh", "--no-refresh");
    let check = tri_state(out, args.check, args.no_check, "--check", "--no-check").unwrap_or(true);

    let mut options = AddRepoOptions::new(parse_repo_uri(&args.uri)?);
    options.alias = args.alias.clone();
    options.name = args.name.clone();
    options.repo_type = repo_type;
    options.enabled = args.disable.then_some(false);
    options.autorefresh = autorefresh;
    options.keep_packages = args.keep_packages.then_some(true);
    options.priority = args.priority;
    options.check = check;

    let repo = add_repository(session.store(), out, options)?;
    out.info(format!(
        "Repository '{}' successfully added",
        repo.display_name()
    ));
    out.info_at(Verbosity::High, format!("URI         : {}", repo.base_urls[0]));
    out.info_at(Verbosity::High, format!("Enabled     : {}", yes_no(repo.enabled)));
    out.info_at(Verbosity::High, format!("Autorefresh : {}", yes_no(repo.autorefresh)));
    out.info_at(Verbosity::High, format!("Priority    : {}", repo.priority));
    Ok(())
}

/// Remove repositories given by alias, number or URI
pub fn cmd_removerepo(session: &mut Session, selectors: &[String]) -> Result<()> {
    let known = session.store().repositories()?;
    // Nothing is removed unless every selector matched
    let targets = select_repositories(&known, selectors)?;

    for repo in targets {
        forget_caches(session.metadata(), &repo);
        session.store().remove_repository(&repo.alias)?;
        session.output().info(format!(
            "Repository '{}' has been removed.",
            repo.display_name()
        ));
    }
    Ok(())
}

/// Give a repository a new alias
pub fn cmd_renamerepo(session: &mut Session, args: &RenameRepoArgs) -> Result<()> {
    let known = session.store().repositories()?;
    let repo = locate(&args.selector, &known)
        .ok_or_else(|| Error::InvalidSelectors(vec![args.selector.clone()]))?;

    session
        .store()
        .rename_repository(&repo.alias, &args.new_alias)?;
    // caches are keyed by alias
    if repo.alias != args.new_alias {
        forget_caches(session.metadata(), repo);
    }
    session.output().info(format!(
        "Repository '{}' renamed to '{}'.",
        repo.alias, args.new_alias
    ));
    Ok(())
}

/// Change properties of repositories
pub fn cmd_modifyrepo(session: &mut Session, args: &ModifyRepoArgs) -> Result<()> {
    let out = session.output();
    let changes = RepoChanges {
        enabled: tri_state(out, args.enable, args.disable, "--enable", "--disable"),
        autorefresh: tri_state(out, args.refresh, args.no_refresh, "--refresh", "--no-refresh"),
        keep_packages: tri_state(
            out,
            args.keep_packages,
            args.no_keep_packages,
            "--keep-packages",
            "--no-keep-packages",
        ),
        priority: args.priority,
        name: args.name.clone(),
    };
    changes.validate()?;

    let filter = RepoFilter {
        all: args.all,
        local: args.local,
        remote: args.remote,
        medium_types: args.medium_type.clone(),
    };

    let known = session.store().repositories()?;
    let targets = if !filter.is_empty() {
        filter.select(&known)
    } else if args.selectors.is_empty() {
        return Err(Error::InvalidArgument(
            "Alias or an aggregate option is required.".to_string(),
        ));
    } else {
        select_repositories(&known, &args.selectors)?
    };

    if targets.is_empty() {
        out.info("No repositories matched the given options.");
        return Ok(());
    }

    for repo in &targets {
        if modify_repository(session.store(), out, repo, &changes)? {
            out.info(format!(
                "Repository '{}' has been successfully modified.",
                repo.display_name()
            ));
        }
    }
    Ok(())
}

/// Refresh raw metadata and rebuild caches
pub fn cmd_refresh(session: &mut Session, args: &RefreshArgs) -> Result<()> {
    if args.build_only && args.download_only {
        return Err(Error::InvalidArgument(
            "The --build-only and --download-only options are mutually exclusive.".to_string(),
        ));
    }
    let options = RefreshOptions {
        force_download: args.force || args.force_download,
        force_build: args.force || args.force_build,
        download_only: args.download_only,
        build_only: args.build_only,
    };

    let selectors = args.all_selectors();
    let specified = !selectors.is_empty();
    let known = persistent_repositories(session)?;
    let targets = select_repositories(&known, &selectors)?;

    let mut summary = RefreshSummary::default();
    {
        let out = session.output();
        let engine = session.engine().ignoring_delay(true);

        for repo in &targets {
            if !repo.enabled {
                let level = if specified {
                    Verbosity::Normal
                } else {
                    Verbosity::High
                };
                out.info_at(
                    level,
                    format!("Skipping disabled repository '{}'", repo.display_name()),
                );
                continue;
            }

            summary.attempted += 1;
            let track = engine.refresh_repo(repo, &options)?;
            if track.is_disabled() {
                summary.failed.push(repo.alias.clone());
            }
        }
    }

    let out = session.output();
    if summary.attempted == 0 {
        out.warning("There are no enabled repositories defined.");
        out.hint("Use 'pkgctl addrepo' or 'pkgctl modifyrepo' commands to add or enable repositories.");
        return Ok(());
    }

    match summary.scope(session.config().refresh.escalate) {
        FailureScope::None => {
            if specified {
                out.info("Specified repositories have been refreshed.");
            } else {
                out.info("All repositories have been refreshed.");
            }
        }
        FailureScope::Partial => {
            out.warning("Some of the repositories have not been refreshed because of an error.");
            session.state_mut().flag(ExitCode::LibraryError);
        }
        FailureScope::Total => {
            return Err(Error::RepositoryError(
                "Could not refresh the repositories because of errors.".to_string(),
            ));
        }
    }
    Ok(())
}

type Cleaner =
    fn(&dyn MetadataService, &RepositoryRecord) -> std::result::Result<(), MetadataError>;

/// Clean local caches
pub fn cmd_clean(session: &mut Session, args: &CleanArgs) -> Result<()> {
    let (metadata, raw, packages) = if args.all {
        (true, true, true)
    } else if args.metadata || args.raw_metadata {
        (args.metadata, args.raw_metadata, false)
    } else {
        (false, false, true)
    };

    let selectors = args.all_selectors();
    let known = persistent_repositories(session)?;
    let targets = select_repositories(&known, &selectors)?;

    let mut failed = false;
    {
        let out = session.output();
        let service = session.metadata();
        for repo in &targets {
            let steps: [(bool, &str, Cleaner); 3] = [
                (metadata, "metadata cache", |m, r| m.clean_cache(r)),
                (raw, "raw metadata cache", |m, r| m.clean_raw_metadata(r)),
                (packages, "package cache", |m, r| m.clean_packages(r)),
            ];
            for (wanted, what, clean) in steps {
                if !wanted {
                    continue;
                }
                match clean(service, repo) {
                    Ok(()) => debug!("Cleaned {} of '{}'", what, repo.alias),
                    Err(e) => {
                        out.error(format!(
                            "Cannot clean {} of repository '{}': {}",
                            what,
                            repo.display_name(),
                            e
                        ));
                        failed = true;
                    }
                }
            }
        }

        if selectors.is_empty() {
            out.info("All repositories have been cleaned up.");
        } else {
            out.info("Specified repositories have been cleaned up.");
        }
    }

    if failed {
        session.state_mut().flag(ExitCode::LibraryError);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Command, SelectorArgs};
    use crate::config::Config;
    use crate::output::MessageKind;
    use crate::progress::SilentProgress;
    use crate::prompt::ScriptedPrompt;
    use crate::repository::SqliteRepoStore;
    use crate::repository::fake::FakeMetadata;
    use crate::resolvable::{SimpleSolver, SqliteTarget};
    use crate::session::{Collaborators, GlobalOptions};
    use tempfile::{TempDir, tempdir};
    use url::Url;

    fn session(dir: &TempDir, metadata: FakeMetadata) -> Session {
        let mut options = GlobalOptions::default();
        options.set_root(dir.path()).unwrap();
        let collab = Collaborators {
            store: Box::new(SqliteRepoStore::in_memory().unwrap()),
            metadata: Box::new(metadata),
            target: Box::new(SqliteTarget::new(dir.path().join("target.db"))),
            prompt: Box::new(ScriptedPrompt::new()),
            progress: Box::new(SilentProgress),
            solver: Box::new(SimpleSolver),
        };
        Session::new(
            options,
            Config::default(),
            Output::captured(Verbosity::Normal),
            collab,
        )
    }

    fn add(session: &Session, alias: &str, enabled: bool) {
        let mut repo = RepositoryRecord::new(
            alias,
            vec![Url::parse(&format!("http://{}.example.com/", alias)).unwrap()],
        );
        repo.enabled = enabled;
        session.store().add_repository(&repo).unwrap();
    }

    #[test]
    fn test_removerepo_fails_closed_on_unknown_selector() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, FakeMetadata::new());
        add(&session, "oss", true);

        let code = session.run_workflow(Command::Removerepo(SelectorArgs {
            selectors: vec!["oss".to_string(), "ghost".to_string()],
        }));
        assert_eq!(code, ExitCode::InvalidArgs);
        assert!(session.store().repository("oss").unwrap().is_some());
        assert!(
            session
                .output()
                .contains(MessageKind::Error, "Repository 'ghost' not found")
        );
    }

    #[test]
    fn test_removerepo_by_number() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, FakeMetadata::new());
        add(&session, "a", true);
        add(&session, "b", true);

        cmd_removerepo(&mut session, &["2".to_string()]).unwrap();
        let left: Vec<_> = session
            .store()
            .repositories()
            .unwrap()
            .into_iter()
            .map(|r| r.alias)
            .collect();
        assert_eq!(left, vec!["a"]);
    }

    #[test]
    fn test_modifyrepo_requires_selection() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, FakeMetadata::new());
        let args = ModifyRepoArgs {
            disable: true,
            ..Default::default()
        };
        assert!(matches!(
            cmd_modifyrepo(&mut session, &args),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_modifyrepo_all_disables_everything() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, FakeMetadata::new());
        add(&session, "a", true);
        add(&session, "b", true);

        let args = ModifyRepoArgs {
            disable: true,
            all: true,
            ..Default::default()
        };
        cmd_modifyrepo(&mut session, &args).unwrap();
        assert!(session.store().repositories().unwrap().iter().all(|r| !r.enabled));
    }

    #[test]
    fn test_refresh_summaries() {
        let dir = tempdir().unwrap();
        let metadata = FakeMetadata::new();
        metadata.fail_refresh("bad", MetadataError::Media("unreachable".to_string()));
        let mut session = session(&dir, metadata);
        add(&session, "good", true);
        add(&session, "bad", true);
        add(&session, "off", false);

        cmd_refresh(&mut session, &RefreshArgs::default()).unwrap();
        assert_eq!(session.state().exit_code, ExitCode::LibraryError);
        assert!(session.output().contains(
            MessageKind::Warning,
            "Some of the repositories have not been refreshed"
        ));

        let only_bad = RefreshArgs {
            selectors: vec!["bad".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            cmd_refresh(&mut session, &only_bad),
            Err(Error::RepositoryError(_))
        ));

        let only_good = RefreshArgs {
            repos: vec!["good".to_string()],
            ..Default::default()
        };
        cmd_refresh(&mut session, &only_good).unwrap();
        assert!(
            session
                .output()
                .contains(MessageKind::Info, "Specified repositories have been refreshed.")
        );
    }

    #[test]
    fn test_refresh_without_enabled_repositories() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, FakeMetadata::new());
        add(&session, "off", false);

        cmd_refresh(&mut session, &RefreshArgs::default()).unwrap();
        assert!(session.output().contains(
            MessageKind::Warning,
            "There are no enabled repositories defined."
        ));
    }

    #[test]
    fn test_repos_export() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, FakeMetadata::new());
        add(&session, "oss", true);

        let path = dir.path().join("all.repo");
        let args = ReposArgs {
            export: Some(path.clone()),
            ..Default::default()
        };
        cmd_repos(&mut session, &args).unwrap();
        let exported = fs::read_to_string(&path).unwrap();
        assert!(exported.contains("[oss]"));
    }

    #[test]
    fn test_repo_file_path() {
        assert_eq!(
            repo_file_path("/etc/extra.repo"),
            Some(Path::new("/etc/extra.repo"))
        );
        assert_eq!(
            repo_file_path("file:///etc/extra.repo"),
            Some(Path::new("/etc/extra.repo"))
        );
        assert!(repo_file_path("http://example.com/extra.repo").is_none());
        assert!(repo_file_path("http://example.com/oss/").is_none());
    }
}
