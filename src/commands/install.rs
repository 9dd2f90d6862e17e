// src/commands/install.rs
//! Software management commands
//!
//! Every command marks items in the pool, lets the solver complete the
//! marks into a change set, shows it, asks, and commits it to the target.

use super::parse_kind;
use crate::cli::{InstallArgs, PackageArgs, UpgradeArgs};
use crate::db::models::ResolvableKind;
use crate::error::{Error, Result};
use crate::resolvable::{ItemId, ResolvablePool};
use crate::session::Session;
use crate::version::Capability;
use tracing::{debug, info};

/// Resolve the marks, show the change set and commit it after confirmation
fn commit_marks(session: &mut Session, dry_run: bool) -> Result<()> {
    let resolution = session.resolve()?;
    let out = session.output();

    if !resolution.problems.is_empty() {
        for problem in &resolution.problems {
            out.error(format!("Problem: {}", problem));
        }
        let count = resolution.problems.len();
        session.pool_mut().clear_marks();
        return Err(Error::ConflictError(format!(
            "{} problem{} left unresolved.",
            count,
            if count == 1 { "" } else { "s" }
        )));
    }

    if resolution.is_empty() {
        out.info("Nothing to do.");
        return Ok(());
    }

    let installs: Vec<String> = resolution.installs().map(|r| r.ident()).collect();
    let removals: Vec<String> = resolution.removals().map(|r| r.ident()).collect();
    if !installs.is_empty() {
        out.info(format!(
            "The following {} item(s) are going to be installed:",
            installs.len()
        ));
        out.data(format!("  {}", installs.join(" ")));
    }
    if !removals.is_empty() {
        out.info(format!(
            "The following {} item(s) are going to be removed:",
            removals.len()
        ));
        out.data(format!("  {}", removals.join(" ")));
    }

    if dry_run {
        out.info("Dry run, nothing was changed.");
        session.pool_mut().clear_marks();
        return Ok(());
    }

    if !session.prompt().confirm("Continue?", true) {
        session.pool_mut().clear_marks();
        return Err(Error::UserAbort);
    }

    info!(
        "Committing {} install(s) and {} removal(s)",
        installs.len(),
        removals.len()
    );
    session.commit(&resolution)?;
    session.pool_mut().clear_marks();
    session.output().info("Done.");
    Ok(())
}

/// Mark every item of `ids`, warning about the locked ones
fn mark_all(session: &mut Session, ids: &[ItemId]) -> usize {
    let mut marked = 0;
    for id in ids {
        match session.pool_mut().mark_install(*id) {
            Ok(()) => marked += 1,
            Err(e) => session.output().warning(e.to_string()),
        }
    }
    marked
}

/// Repository candidates for `cap`: by name first, then by provides
fn candidates(pool: &ResolvablePool, kind: ResolvableKind, cap: &Capability) -> Vec<ItemId> {
    let by_name: Vec<ItemId> = pool
        .available(kind, &cap.name)
        .into_iter()
        .filter(|id| pool.item(*id).resolvable.provides_capability(cap))
        .collect();
    if !by_name.is_empty() {
        return by_name;
    }
    pool.what_provides(cap)
        .into_iter()
        .filter(|id| {
            let item = pool.item(*id);
            !item.installed && item.kind() == kind
        })
        .collect()
}

fn parse_capabilities(names: &[String]) -> Result<Vec<Capability>> {
    names
        .iter()
        .map(|name| {
            Capability::parse(name).map_err(|e| {
                Error::InvalidArgument(format!("'{}' is not a valid capability: {}", name, e))
            })
        })
        .collect()
}

/// Install resolvables by name or capability
pub fn cmd_install(session: &mut Session, args: &InstallArgs) -> Result<()> {
    let kind = parse_kind(args.kind.as_deref(), ResolvableKind::Package)?;
    let wanted = parse_capabilities(&args.names)?;
    session.prepare(&args.repos)?;

    let mut picks = Vec::new();
    let mut missing = Vec::new();
    {
        let pool = session.pool();
        let out = session.output();
        for cap in &wanted {
            if let Some(id) = pool.installed(kind, &cap.name)
                && pool.item(id).resolvable.provides_capability(cap)
            {
                out.info(format!(
                    "'{}' is already installed.",
                    pool.item(id).resolvable.ident()
                ));
                continue;
            }

            let found = candidates(pool, kind, cap);
            match pool.best_of(found.iter().copied()) {
                Some(id) => picks.push(id),
                None if !found.is_empty() => {
                    out.warning(format!("All candidates for '{}' are locked.", cap));
                    missing.push(cap.to_string());
                }
                None => missing.push(cap.to_string()),
            }
        }
    }

    if !missing.is_empty() {
        return Err(Error::NotFoundError(format!(
            "No provider of '{}' found.",
            missing.join("', '")
        )));
    }

    debug!("Install candidates: {:?}", picks);
    mark_all(session, &picks);
    commit_marks(session, args.dry_run)
}

/// Remove installed resolvables
pub fn cmd_remove(session: &mut Session, args: &PackageArgs) -> Result<()> {
    if args.names.is_empty() {
        return Err(Error::InvalidArgument(
            "At least one name is required.".to_string(),
        ));
    }
    let kind = parse_kind(args.kind.as_deref(), ResolvableKind::Package)?;
    session.prepare(&args.repos)?;

    for name in &args.names {
        match session.pool().installed(kind, name) {
            Some(id) => session.pool_mut().mark_remove(id)?,
            None => session
                .output()
                .warning(format!("'{}' is not installed.", name)),
        }
    }
    commit_marks(session, args.dry_run)
}

/// Update installed resolvables, or apply needed patches with `-t patch`
pub fn cmd_update(session: &mut Session, args: &PackageArgs) -> Result<()> {
    let kind = parse_kind(args.kind.as_deref(), ResolvableKind::Package)?;
    session.prepare(&args.repos)?;

    let wanted = |name: &str| args.names.is_empty() || args.names.iter().any(|n| n == name);
    let status = session.status();
    let picks: Vec<ItemId> = {
        let pool = session.pool();
        if kind == ResolvableKind::Patch {
            status
                .needed_patches
                .iter()
                .copied()
                .filter(|id| wanted(pool.item(*id).name()))
                .collect()
        } else {
            status
                .updates
                .iter()
                .filter(|u| pool.item(u.installed).kind() == kind)
                .filter(|u| wanted(pool.item(u.installed).name()))
                .map(|u| u.candidate)
                .collect()
        }
    };

    if kind != ResolvableKind::Patch {
        for name in &args.names {
            if session.pool().installed(kind, name).is_none() {
                session
                    .output()
                    .warning(format!("'{}' is not installed.", name));
            }
        }
    }

    if mark_all(session, &picks) == 0 {
        session.output().info("No updates found.");
        return Ok(());
    }
    commit_marks(session, args.dry_run)
}

/// Move every installed package to its best candidate
pub fn cmd_dist_upgrade(session: &mut Session, args: &UpgradeArgs) -> Result<()> {
    session.prepare(&args.repos)?;

    let picks: Vec<ItemId> = {
        let pool = session.pool();
        pool.by_kind(ResolvableKind::Package)
            .filter(|(_, item)| item.installed)
            .filter_map(|(_, item)| {
                let best = pool.best_of(pool.available(ResolvableKind::Package, item.name()))?;
                (pool.item(best).resolvable.edition != item.resolvable.edition).then_some(best)
            })
            .collect()
    };

    mark_all(session, &picks);
    commit_marks(session, args.dry_run)
}

/// Install providers for requirements of installed items nobody satisfies
pub fn cmd_verify(session: &mut Session, args: &UpgradeArgs) -> Result<()> {
    session.prepare(&args.repos)?;

    let mut picks = Vec::new();
    let mut unmet = 0;
    {
        let pool = session.pool();
        let out = session.output();
        for (_, item) in pool.items().filter(|(_, i)| i.installed) {
            for requirement in &item.resolvable.requires {
                let Ok(cap) = Capability::parse(requirement) else {
                    debug!("Skipping unparsable requirement '{}'", requirement);
                    continue;
                };
                if pool.is_satisfied(&cap) {
                    continue;
                }
                unmet += 1;
                let providers = pool
                    .what_provides(&cap)
                    .into_iter()
                    .filter(|id| !pool.item(*id).installed);
                match pool.best_of(providers) {
                    Some(id) if !picks.contains(&id) => picks.push(id),
                    Some(_) => {}
                    None => out.warning(format!(
                        "Nothing provides '{}' required by '{}'.",
                        cap,
                        item.resolvable.ident()
                    )),
                }
            }
        }
    }

    if unmet == 0 {
        session
            .output()
            .info("Dependencies of all installed items are satisfied.");
        return Ok(());
    }
    mark_all(session, &picks);
    commit_marks(session, args.dry_run)
}

/// Install packages recommended by installed items that are not yet present
pub fn cmd_install_new_recommends(session: &mut Session, args: &UpgradeArgs) -> Result<()> {
    session.prepare(&args.repos)?;

    let picks: Vec<ItemId> = {
        let pool = session.pool();
        let mut picks = Vec::new();
        for (_, item) in pool.items().filter(|(_, i)| i.installed) {
            for recommend in &item.resolvable.recommends {
                let Ok(cap) = Capability::parse(recommend) else {
                    debug!("Skipping unparsable recommendation '{}'", recommend);
                    continue;
                };
                if pool.is_satisfied(&cap) {
                    continue;
                }
                let providers = pool
                    .what_provides(&cap)
                    .into_iter()
                    .filter(|id| !pool.item(*id).installed);
                match pool.best_of(providers) {
                    Some(id) if !picks.contains(&id) => picks.push(id),
                    Some(_) => {}
                    None => debug!(
                        "Nothing provides '{}' recommended by '{}'",
                        cap,
                        item.resolvable.ident()
                    ),
                }
            }
        }
        picks
    };

    if picks.is_empty() {
        session.output().info("No new recommended packages found.");
        return Ok(());
    }
    mark_all(session, &picks);
    commit_marks(session, args.dry_run)
}

/// Install source packages
pub fn cmd_source_install(session: &mut Session, args: &PackageArgs) -> Result<()> {
    if args.names.is_empty() {
        return Err(Error::InvalidArgument(
            "At least one source package name is required.".to_string(),
        ));
    }
    session.prepare(&args.repos)?;

    let mut picks = Vec::new();
    for name in &args.names {
        let pool = session.pool();
        match pool.best_of(pool.available(ResolvableKind::SrcPackage, name)) {
            Some(id) => picks.push(id),
            None => {
                return Err(Error::NotFoundError(format!(
                    "Source package '{}' not found.",
                    name
                )));
            }
        }
    }

    mark_all(session, &picks);
    commit_marks(session, args.dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Command;
    use crate::config::Config;
    use crate::db::models::{RepositoryRecord, Resolvable};
    use crate::exit_code::ExitCode;
    use crate::output::{MessageKind, Output, Verbosity};
    use crate::progress::SilentProgress;
    use crate::prompt::ScriptedPrompt;
    use crate::repository::SqliteRepoStore;
    use crate::repository::fake::FakeMetadata;
    use crate::resolvable::{SimpleSolver, SqliteTarget};
    use crate::session::{Collaborators, GlobalOptions};
    use tempfile::{TempDir, tempdir};
    use url::Url;

    fn package(name: &str, edition: &str) -> Resolvable {
        Resolvable::new(ResolvableKind::Package, name, edition)
    }

    fn session(dir: &TempDir, published: Vec<Resolvable>, confirm: bool) -> Session {
        let metadata = FakeMetadata::new();
        metadata.publish("oss", published);

        let mut options = GlobalOptions::default();
        options.set_root(dir.path()).unwrap();
        let collab = Collaborators {
            store: Box::new(SqliteRepoStore::in_memory().unwrap()),
            metadata: Box::new(metadata),
            target: Box::new(SqliteTarget::new(dir.path().join("target.db"))),
            prompt: Box::new(ScriptedPrompt::new().with_confirms([confirm])),
            progress: Box::new(SilentProgress),
            solver: Box::new(SimpleSolver),
        };
        let session = Session::new(
            options,
            Config::default(),
            Output::captured(Verbosity::Normal),
            collab,
        );
        let repo = RepositoryRecord::new(
            "oss",
            vec![Url::parse("http://oss.example.com/").unwrap()],
        );
        session.store().add_repository(&repo).unwrap();
        session
    }

    fn installed_names(session: &Session) -> Vec<String> {
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

    fn install(names: &[&str], dry_run: bool) -> Command {
        Command::Install(InstallArgs {
            names: names.iter().map(|n| n.to_string()).collect(),
            dry_run,
            ..Default::default()
        })
    }

    #[test]
    fn test_install_pulls_requirements() {
        let dir = tempdir().unwrap();
        let mut vim = package("vim", "9.0-1");
        vim.requires = vec!["libfoo".to_string()];
        let mut session = session(&dir, vec![vim, package("libfoo", "1.0-1")], true);

        let code = session.run_workflow(install(&["vim"], false));
        assert_eq!(code, ExitCode::Ok);
        assert_eq!(installed_names(&session), vec!["libfoo", "vim"]);
        assert!(session.output().contains(MessageKind::Info, "Done."));
    }

    #[test]
    fn test_install_missing_name_commits_nothing() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, vec![package("vim", "9.0-1")], true);

        let code = session.run_workflow(install(&["vim", "emacs"], false));
        assert_eq!(code, ExitCode::LibraryError);
        assert!(session.output().contains(MessageKind::Error, "emacs"));
        assert!(installed_names(&session).is_empty());
    }

    #[test]
    fn test_install_dry_run_changes_nothing() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, vec![package("vim", "9.0-1")], true);

        let code = session.run_workflow(install(&["vim"], true));
        assert_eq!(code, ExitCode::Ok);
        assert!(session.output().contains(MessageKind::Info, "Dry run"));
        assert!(installed_names(&session).is_empty());
    }

    #[test]
    fn test_declined_confirmation_aborts() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, vec![package("vim", "9.0-1")], false);

        let code = session.run_workflow(install(&["vim"], false));
        assert_eq!(code, ExitCode::Aborted);
        assert!(installed_names(&session).is_empty());
    }

    #[test]
    fn test_invalid_capability_is_invalid_argument() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, Vec::new(), true);

        let code = session.run_workflow(install(&["=1.0"], false));
        assert_eq!(code, ExitCode::InvalidArgs);
    }

    #[test]
    fn test_install_new_recommends() {
        let dir = tempdir().unwrap();
        let published = || {
            let mut vim = package("vim", "9.0-1");
            vim.recommends = vec!["vim-data".to_string(), "vim-icons".to_string()];
            vec![vim, package("vim-data", "9.0-1"), package("ctags", "6.0")]
        };
        let mut first = session(&dir, published(), true);
        assert_eq!(first.run_workflow(install(&["vim"], false)), ExitCode::Ok);
        assert_eq!(installed_names(&first), vec!["vim"]);

        let recommends = Command::InstallNewRecommends(UpgradeArgs::default());
        let mut second = session(&dir, published(), true);
        assert_eq!(second.run_workflow(recommends.clone()), ExitCode::Ok);
        assert_eq!(installed_names(&second), vec!["vim", "vim-data"]);

        let mut third = session(&dir, published(), true);
        assert_eq!(third.run_workflow(recommends), ExitCode::Ok);
        assert!(
            third
                .output()
                .contains(MessageKind::Info, "No new recommended packages found.")
        );
    }

    #[test]
    fn test_remove_requires_names() {
        let dir = tempdir().unwrap();
        let mut session = session(&dir, Vec::new(), true);

        let code = session.run_workflow(Command::Remove(PackageArgs::default()));
        assert_eq!(code, ExitCode::InvalidArgs);
    }
}
