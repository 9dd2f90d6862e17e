// src/commands/mod.rs
//! Command handlers for pkgctl
//!
//! Each handler runs one workflow over a `Session`. Handlers report
//! per-item problems through the session output and raise the exit code
//! with `SessionState::flag`; an `Err` ends the command.

mod install;
mod locks;
mod query;
mod repo;
mod service;

pub use install::{
    cmd_dist_upgrade, cmd_install, cmd_install_new_recommends, cmd_remove, cmd_source_install,
    cmd_update, cmd_verify,
};
pub use locks::{cmd_addlock, cmd_cleanlocks, cmd_locks, cmd_removelock};
pub use query::{
    cmd_info, cmd_list_kind, cmd_list_updates, cmd_patch_check, cmd_search, cmd_what_conflicts,
    cmd_what_provides, cmd_what_requires,
};
pub use repo::{
    cmd_addrepo, cmd_clean, cmd_modifyrepo, cmd_refresh, cmd_removerepo, cmd_renamerepo,
    cmd_repos,
};
pub use service::{cmd_addservice, cmd_refresh_services, cmd_removeservice, cmd_services};

use crate::cli::Command;
use crate::db::models::ResolvableKind;
use crate::error::Result;
use crate::session::Session;

/// Run the handler of `command`
pub fn dispatch(session: &mut Session, command: &Command) -> Result<()> {
    match command {
        Command::Repos(args) => cmd_repos(session, args),
        Command::Addrepo(args) => cmd_addrepo(session, args),
        Command::Removerepo(args) => cmd_removerepo(session, &args.selectors),
        Command::Renamerepo(args) => cmd_renamerepo(session, args),
        Command::Modifyrepo(args) => cmd_modifyrepo(session, args),
        Command::Refresh(args) => cmd_refresh(session, args),
        Command::Clean(args) => cmd_clean(session, args),

        Command::Services => cmd_services(session),
        Command::Addservice(args) => cmd_addservice(session, args),
        Command::Removeservice(args) => cmd_removeservice(session, &args.selectors),
        Command::RefreshServices => cmd_refresh_services(session),

        Command::Install(args) => cmd_install(session, args),
        Command::Remove(args) => cmd_remove(session, args),
        Command::Update(args) => cmd_update(session, args),
        Command::DistUpgrade(args) => cmd_dist_upgrade(session, args),
        Command::Verify(args) => cmd_verify(session, args),
        Command::SourceInstall(args) => cmd_source_install(session, args),
        Command::InstallNewRecommends(args) => cmd_install_new_recommends(session, args),

        Command::Search(args) => cmd_search(session, args),
        Command::Info(args) => cmd_info(session, args),
        Command::Packages(args) => cmd_list_kind(session, ResolvableKind::Package, args),
        Command::Patches(args) => cmd_list_kind(session, ResolvableKind::Patch, args),
        Command::Patterns(args) => cmd_list_kind(session, ResolvableKind::Pattern, args),
        Command::Products(args) => cmd_list_kind(session, ResolvableKind::Product, args),
        Command::WhatProvides(args) => cmd_what_provides(session, args),
        Command::WhatRequires(args) => cmd_what_requires(session, args),
        Command::WhatConflicts(args) => cmd_what_conflicts(session, args),
        Command::ListUpdates(args) => cmd_list_updates(session, args),
        Command::PatchCheck(args) => cmd_patch_check(session, args),

        Command::Addlock(args) => cmd_addlock(session, args),
        Command::Removelock(args) => cmd_removelock(session, args),
        Command::Locks => cmd_locks(session),
        Command::Cleanlocks => cmd_cleanlocks(session),

        // Entering and leaving the shell is handled by the caller
        Command::Shell => {
            session
                .output()
                .warning("You already are running pkgctl's shell.");
            Ok(())
        }
        Command::Quit => Ok(()),
    }
}

/// Parse an optional `--type` value
fn parse_kind(kind: Option<&str>, default: ResolvableKind) -> Result<ResolvableKind> {
    kind.map_or(Ok(default), str::parse)
}

/// Render rows as a `|`-separated table with a header rule
fn table(header: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(header.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines
}

fn yes_no(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}
