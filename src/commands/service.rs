// src/commands/service.rs
//! Service commands

use super::{table, yes_no};
use crate::cli::AddServiceArgs;
use crate::db::models::ServiceRecord;
use crate::error::{Error, Result};
use crate::exit_code::ExitCode;
use crate::repository::locate_many;
use crate::repository::management::{add_service, refresh_service};
use crate::session::{Session, parse_repo_uri};
use tracing::{debug, info};

/// List services
pub fn cmd_services(session: &mut Session) -> Result<()> {
    info!("Listing services");
    let services = session.store().services()?;
    let out = session.output();

    if services.is_empty() {
        out.warning("No services defined.");
        out.hint("Use the 'pkgctl addservice' command to add one or more services.");
        return Ok(());
    }

    if out.is_machine_readable() {
        out.data(serde_json::to_string_pretty(&services)?);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = services
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                (i + 1).to_string(),
                s.alias.clone(),
                s.display_name().to_string(),
                yes_no(s.enabled),
                s.url.to_string(),
            ]
        })
        .collect();
    for line in table(&["#", "Alias", "Name", "Enabled", "URI"], &rows) {
        out.data(line);
    }
    Ok(())
}

/// Add a service
pub fn cmd_addservice(session: &mut Session, args: &AddServiceArgs) -> Result<()> {
    let url = parse_repo_uri(&args.uri)?;
    let service = add_service(session.store(), url, args.alias.clone(), args.name.clone())?;
    session.output().info(format!(
        "Service '{}' has been successfully added.",
        service.display_name()
    ));
    Ok(())
}

/// Remove services and the repositories they manage
pub fn cmd_removeservice(session: &mut Session, selectors: &[String]) -> Result<()> {
    let known = session.store().services()?;
    let located = locate_many(selectors, &known);
    if !located.unmatched.is_empty() {
        return Err(Error::InvalidServiceSelectors(located.unmatched));
    }

    for service in located.matched {
        remove_one(session, &service)?;
    }
    Ok(())
}

fn remove_one(session: &Session, service: &ServiceRecord) -> Result<()> {
    for repo in session.store().repositories()? {
        if repo.service.as_deref() != Some(service.alias.as_str()) {
            continue;
        }
        if let Err(e) = session.metadata().clean_cache(&repo) {
            debug!("Could not clean cache of '{}': {}", repo.alias, e);
        }
        if let Err(e) = session.metadata().clean_raw_metadata(&repo) {
            debug!("Could not clean raw metadata of '{}': {}", repo.alias, e);
        }
    }

    session.store().remove_service(&service.alias)?;
    session.output().info(format!(
        "Service '{}' has been removed.",
        service.display_name()
    ));
    Ok(())
}

/// Sync the repositories of every enabled service
pub fn cmd_refresh_services(session: &mut Session) -> Result<()> {
    let services = session.store().services()?;
    if services.is_empty() {
        session.output().info("No services defined.");
        return Ok(());
    }

    let mut failed = false;
    for service in &services {
        let out = session.output();
        if !service.enabled {
            out.info(format!(
                "Skipping disabled service '{}'",
                service.display_name()
            ));
            continue;
        }

        out.info(format!("Refreshing service '{}'.", service.display_name()));
        match refresh_service(session.store(), session.metadata(), service) {
            Ok(sync) => {
                for alias in &sync.added {
                    out.info(format!("Adding repository '{}'", alias));
                }
                for alias in &sync.updated {
                    out.info(format!("Modifying repository '{}'", alias));
                }
                for alias in &sync.removed {
                    out.info(format!("Removing repository '{}'", alias));
                }
            }
            Err(e) => {
                out.report(&e);
                failed = true;
            }
        }
    }

    if failed {
        session.state_mut().flag(ExitCode::LibraryError);
        session
            .output()
            .warning("Some of the services have not been refreshed because of an error.");
    } else {
        session
            .output()
            .info("All services have been refreshed.");
    }
    Ok(())
}
