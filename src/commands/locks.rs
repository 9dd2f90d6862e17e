// src/commands/locks.rs
//! Package lock commands
//!
//! Locks live in the target database. After every change the pool is
//! given the new lock set so later commands in a shell see it.

use super::{parse_kind, table};
use crate::cli::{LockArgs, RemoveLockArgs};
use crate::db::models::{PackageLock, ResolvableKind};
use crate::error::{Error, Result};
use crate::repository::locate;
use crate::session::Session;
use tracing::{debug, info};

fn reapply(session: &mut Session) -> Result<()> {
    let locks = session.target().locks()?;
    debug!("Applying {} lock(s) to the pool", locks.len());
    session.pool_mut().apply_locks(locks);
    Ok(())
}

/// Add package locks
pub fn cmd_addlock(session: &mut Session, args: &LockArgs) -> Result<()> {
    let kind = parse_kind(args.kind.as_deref(), ResolvableKind::Package)?;
    let repo_alias = match &args.repo {
        Some(selector) => {
            let known = session.store().repositories()?;
            let repo = locate(selector, &known)
                .ok_or_else(|| Error::InvalidSelectors(vec![selector.clone()]))?;
            Some(repo.alias.clone())
        }
        None => None,
    };
    session.init_target()?;

    let existing = session.target().locks()?;
    let mut added = 0;
    for name in &args.names {
        let mut lock = PackageLock::new(name.as_str(), kind);
        lock.repo_alias = repo_alias.clone();
        if existing.iter().any(|l| {
            l.name == lock.name && l.kind == lock.kind && l.repo_alias == lock.repo_alias
        }) {
            session
                .output()
                .info(format!("Lock for '{}' already exists.", name));
            continue;
        }
        session.target_mut().add_lock(&mut lock)?;
        info!("Added lock {:?}", lock);
        added += 1;
    }

    reapply(session)?;
    match added {
        0 => {}
        1 => session
            .output()
            .info("Specified lock has been successfully added."),
        n => session
            .output()
            .info(format!("{} locks have been successfully added.", n)),
    }
    Ok(())
}

/// Remove package locks by name or by number in the `locks` listing
pub fn cmd_removelock(session: &mut Session, args: &RemoveLockArgs) -> Result<()> {
    let kind: Option<ResolvableKind> = args.kind.as_deref().map(str::parse).transpose()?;
    session.init_target()?;
    let existing = session.target().locks()?;

    let mut ids = Vec::new();
    for token in &args.locks {
        let matched: Vec<i64> = match token.parse::<usize>() {
            Ok(number) => existing
                .get(number.wrapping_sub(1))
                .and_then(|l| l.id)
                .into_iter()
                .collect(),
            Err(_) => existing
                .iter()
                .filter(|l| l.name == *token && kind.is_none_or(|k| l.kind == k))
                .filter_map(|l| l.id)
                .collect(),
        };
        if matched.is_empty() {
            session
                .output()
                .warning(format!("No lock matches '{}'.", token));
        }
        for id in matched {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    let mut removed = 0;
    for id in ids {
        if session.target_mut().remove_lock(id)? {
            removed += 1;
        }
    }

    reapply(session)?;
    session.output().info(format!(
        "{} lock{} successfully removed.",
        removed,
        if removed == 1 { " has been" } else { "s have been" }
    ));
    Ok(())
}

/// List package locks
pub fn cmd_locks(session: &mut Session) -> Result<()> {
    session.init_target()?;
    let locks = session.target().locks()?;
    let out = session.output();

    if out.is_machine_readable() {
        out.data(serde_json::to_string_pretty(&locks)?);
        return Ok(());
    }
    if locks.is_empty() {
        out.info("There are no package locks defined.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = locks
        .iter()
        .enumerate()
        .map(|(i, lock)| {
            vec![
                (i + 1).to_string(),
                lock.name.clone(),
                lock.kind.to_string(),
                lock.repo_alias.clone().unwrap_or_else(|| "(any)".to_string()),
            ]
        })
        .collect();
    for line in table(&["#", "Name", "Type", "Repository"], &rows) {
        out.data(line);
    }
    Ok(())
}

/// Remove every package lock
pub fn cmd_cleanlocks(session: &mut Session) -> Result<()> {
    session.init_target()?;
    let removed = session.target_mut().clean_locks()?;
    reapply(session)?;
    session
        .output()
        .info(format!("Removed {} lock{}.", removed, if removed == 1 { "" } else { "s" }));
    Ok(())
}
