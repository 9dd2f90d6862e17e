// src/commands/query.rs
//! Query commands over the resolvable pool

use super::{parse_kind, table, yes_no};
use crate::cli::{CapabilityArgs, InfoArgs, ListArgs, ListUpdatesArgs, SearchArgs};
use crate::db::models::ResolvableKind;
use crate::error::{Error, Result};
use crate::exit_code::ExitCode;
use crate::output::Output;
use crate::resolvable::{ItemId, PoolItem, ResolvablePool, SearchQuery};
use crate::session::Session;
use crate::version::Capability;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;

/// Installed-state column: `i` installed, `v` other edition installed
fn status_of(pool: &ResolvablePool, item: &PoolItem) -> &'static str {
    if item.installed {
        return "i";
    }
    match pool.installed(item.kind(), item.name()) {
        Some(id) if pool.item(id).resolvable.edition == item.resolvable.edition => "i",
        Some(_) => "v",
        None => "",
    }
}

/// Print rows as a table, or as JSON objects keyed by the header
fn emit(out: &Output, header: &[&str], rows: Vec<Vec<String>>) {
    if out.is_machine_readable() {
        let objects: Vec<serde_json::Value> = rows
            .into_iter()
            .map(|row| {
                let fields = header
                    .iter()
                    .zip(row)
                    .map(|(key, value)| (key.to_lowercase().replace(' ', "_"), json!(value)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(fields)
            })
            .collect();
        out.data(serde_json::Value::Array(objects).to_string());
        return;
    }
    for line in table(header, &rows) {
        out.data(line);
    }
}

/// Search resolvables by name and summary
pub fn cmd_search(session: &mut Session, args: &SearchArgs) -> Result<()> {
    let kind: Option<ResolvableKind> = args.kind.as_deref().map(str::parse).transpose()?;
    if args.installed_only && args.uninstalled_only {
        return Err(Error::InvalidArgument(
            "Cannot use --installed-only together with --uninstalled-only.".to_string(),
        ));
    }
    session.prepare(&args.repos)?;

    let query = SearchQuery {
        terms: args.terms.clone(),
        kind,
        match_exact: args.match_exact,
        installed_only: args.installed_only,
        uninstalled_only: args.uninstalled_only,
    };
    let pool = session.pool();
    let out = session.output();

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for id in pool.search(&query) {
        let item = pool.item(id);
        if !seen.insert((item.kind(), item.name().to_string())) {
            continue;
        }
        let installed = pool.installed(item.kind(), item.name()).is_some();
        rows.push(vec![
            if installed { "i" } else { "" }.to_string(),
            item.name().to_string(),
            item.resolvable.summary.clone(),
            item.kind().to_string(),
        ]);
    }
    info!("Search matched {} item(s)", rows.len());

    if rows.is_empty() {
        out.info("No matching items found.");
        return Ok(());
    }
    rows.sort_by(|a, b| a[1].cmp(&b[1]));
    emit(out, &["S", "Name", "Summary", "Type"], rows);
    Ok(())
}

/// Show details of resolvables
pub fn cmd_info(session: &mut Session, args: &InfoArgs) -> Result<()> {
    let kind = parse_kind(args.kind.as_deref(), ResolvableKind::Package)?;
    session.prepare(&args.repos)?;
    let pool = session.pool();
    let out = session.output();

    for name in &args.names {
        let installed = pool.installed(kind, name);
        let candidate = pool.best_of(pool.available(kind, name));
        let Some(shown) = candidate.or(installed) else {
            out.warning(format!("{} '{}' not found.", kind, name));
            continue;
        };
        let item = pool.item(shown);
        let r = &item.resolvable;

        let status = match (installed, candidate) {
            (None, _) => "not installed".to_string(),
            (Some(i), Some(c)) if pool.item(i).resolvable.edition != pool.item(c).resolvable.edition => {
                format!(
                    "out-of-date (version {} installed)",
                    pool.item(i).resolvable.edition
                )
            }
            (Some(_), _) => "up-to-date".to_string(),
        };

        out.data(format!("Information for {} {}:", kind, name));
        out.data(format!("Repository     : {}", item.repository()));
        out.data(format!("Name           : {}", r.name));
        out.data(format!("Version        : {}", r.edition));
        out.data(format!("Arch           : {}", r.arch));
        out.data(format!("Installed      : {}", yes_no(installed.is_some())));
        out.data(format!("Status         : {}", status));
        if let Some(category) = &r.category {
            out.data(format!("Category       : {}", category));
        }
        out.data(format!("Summary        : {}", r.summary));
        if !r.provides.is_empty() {
            out.data(format!("Provides       : {}", r.provides.join(", ")));
        }
        if !r.requires.is_empty() {
            out.data(format!("Requires       : {}", r.requires.join(", ")));
        }
        out.data("");
    }
    Ok(())
}

/// List all resolvables of one kind
pub fn cmd_list_kind(session: &mut Session, kind: ResolvableKind, args: &ListArgs) -> Result<()> {
    if args.installed_only && args.uninstalled_only {
        return Err(Error::InvalidArgument(
            "Cannot use --installed-only together with --uninstalled-only.".to_string(),
        ));
    }
    let selectors = args.all_selectors();
    session.prepare(&selectors)?;
    let pool = session.pool();
    let out = session.output();

    let shown_on_repo = |item: &PoolItem| {
        pool.available(item.kind(), item.name())
            .into_iter()
            .any(|id| pool.item(id).resolvable.edition == item.resolvable.edition)
    };

    let mut rows: Vec<Vec<String>> = pool
        .by_kind(kind)
        // installed items already listed through their repository
        .filter(|(_, item)| !(item.installed && (shown_on_repo(item) || !selectors.is_empty())))
        .filter_map(|(_, item)| {
            let status = status_of(pool, item);
            if args.installed_only && status.is_empty() {
                return None;
            }
            if args.uninstalled_only && status == "i" {
                return None;
            }
            let r = &item.resolvable;
            let detail = match kind {
                ResolvableKind::Patch => r.category.clone().unwrap_or_default(),
                _ => r.arch.clone(),
            };
            Some(vec![
                status.to_string(),
                item.repository().to_string(),
                r.name.clone(),
                r.edition.clone(),
                detail,
            ])
        })
        .collect();

    if rows.is_empty() {
        out.info(format!("No {}s found.", kind));
        return Ok(());
    }
    rows.sort_by(|a, b| (&a[2], &a[1]).cmp(&(&b[2], &b[1])));
    let last = if kind == ResolvableKind::Patch { "Category" } else { "Arch" };
    emit(out, &["S", "Repository", "Name", "Version", last], rows);
    Ok(())
}

/// Table of the items a capability query selects
fn capability_query(
    session: &mut Session,
    args: &CapabilityArgs,
    select: fn(&ResolvablePool, &Capability) -> Vec<ItemId>,
    none_found: &str,
) -> Result<()> {
    let cap = Capability::parse(&args.capability).map_err(|e| {
        Error::InvalidArgument(format!(
            "'{}' is not a valid capability: {}",
            args.capability, e
        ))
    })?;
    session.prepare(&[])?;
    let pool = session.pool();
    let out = session.output();

    let rows: Vec<Vec<String>> = select(pool, &cap)
        .into_iter()
        .map(|id| {
            let item = pool.item(id);
            vec![
                status_of(pool, item).to_string(),
                item.name().to_string(),
                item.kind().to_string(),
                item.resolvable.edition.clone(),
                item.repository().to_string(),
            ]
        })
        .collect();

    if rows.is_empty() {
        out.info(format!("No {} '{}' found.", none_found, cap));
        return Ok(());
    }
    emit(out, &["S", "Name", "Type", "Version", "Repository"], rows);
    Ok(())
}

/// List resolvables providing a capability
pub fn cmd_what_provides(session: &mut Session, args: &CapabilityArgs) -> Result<()> {
    capability_query(session, args, ResolvablePool::what_provides, "providers of")
}

/// List resolvables requiring a capability
pub fn cmd_what_requires(session: &mut Session, args: &CapabilityArgs) -> Result<()> {
    capability_query(session, args, ResolvablePool::what_requires, "items requiring")
}

/// List resolvables conflicting with a capability
pub fn cmd_what_conflicts(session: &mut Session, args: &CapabilityArgs) -> Result<()> {
    capability_query(session, args, ResolvablePool::what_conflicts, "items conflicting with")
}

/// List available updates or needed patches
pub fn cmd_list_updates(session: &mut Session, args: &ListUpdatesArgs) -> Result<()> {
    let kind = parse_kind(args.kind.as_deref(), ResolvableKind::Package)?;
    session.prepare(&args.repos)?;
    let status = session.status();
    let pool = session.pool();
    let out = session.output();

    if kind == ResolvableKind::Patch {
        let rows: Vec<Vec<String>> = status
            .needed_patches
            .iter()
            .map(|id| {
                let item = pool.item(*id);
                vec![
                    item.repository().to_string(),
                    item.name().to_string(),
                    item.resolvable.category.clone().unwrap_or_default(),
                    item.resolvable.edition.clone(),
                    item.resolvable.summary.clone(),
                ]
            })
            .collect();
        if rows.is_empty() {
            out.info("No updates found.");
            return Ok(());
        }
        emit(out, &["Repository", "Name", "Category", "Version", "Summary"], rows);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = status
        .updates
        .iter()
        .filter(|u| pool.item(u.installed).kind() == kind)
        .map(|u| {
            let (current, candidate) = (pool.item(u.installed), pool.item(u.candidate));
            vec![
                "v".to_string(),
                candidate.repository().to_string(),
                candidate.name().to_string(),
                current.resolvable.edition.clone(),
                candidate.resolvable.edition.clone(),
                candidate.resolvable.arch.clone(),
            ]
        })
        .collect();
    if rows.is_empty() {
        out.info("No updates found.");
        return Ok(());
    }
    emit(
        out,
        &["S", "Repository", "Name", "Current Version", "Available Version", "Arch"],
        rows,
    );
    Ok(())
}

/// Count needed patches; the exit code tells whether any are needed
pub fn cmd_patch_check(session: &mut Session, args: &ListArgs) -> Result<()> {
    session.prepare(&args.all_selectors())?;
    let status = session.status();
    let needed = status.needed_patches.len();
    let security = status.security_patches(session.pool());

    session.output().info(format!(
        "{} patches needed ({} security patches)",
        needed, security
    ));
    if security > 0 {
        session.state_mut().flag(ExitCode::SecurityUpdateNeeded);
    } else if needed > 0 {
        session.state_mut().flag(ExitCode::UpdateNeeded);
    }
    Ok(())
}
