// tests/packages.rs

//! Package operations, queries and locks over file:// media.

mod common;

use common::{TestSystem, aliases, installed, run, said};
use pkgctl::ExitCode;
use pkgctl::config::Config;
use pkgctl::output::MessageKind;
use pkgctl::resolvable::{
    Resolution, ResolvablePool, SimpleSolver, Solver, SystemStatus, Target,
};
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

const OSS: &str = r#"[
    {"name": "vim", "version": "9.1-1", "summary": "Vi IMproved", "requires": ["libfoo"]},
    {"name": "libfoo", "version": "1.0-1"},
    {"name": "nano", "version": "7.2-1", "summary": "Small editor"}
]"#;

fn system_with_oss() -> (TestSystem, Url) {
    let system = TestSystem::new();
    let oss = system.publish("oss", OSS);
    (system, oss)
}

#[test]
fn test_install_and_remove() {
    let (system, oss) = system_with_oss();
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));

    assert_eq!(run(&mut session, "install vim"), ExitCode::Ok);
    assert_eq!(installed(&mut session), vec!["libfoo", "vim"]);

    // a fresh process sees the new installed state
    let mut session = system.session();
    assert_eq!(run(&mut session, "remove libfoo"), ExitCode::Ok);
    assert!(installed(&mut session).is_empty());
}

#[test]
fn test_install_of_unknown_name_changes_nothing() {
    let (system, oss) = system_with_oss();
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));

    assert_eq!(run(&mut session, "install vim emacs"), ExitCode::LibraryError);
    assert!(said(&session, MessageKind::Error, "No provider of 'emacs' found."));
    assert!(installed(&mut session).is_empty());
}

#[test]
fn test_dry_run() {
    let (system, oss) = system_with_oss();
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));

    assert_eq!(run(&mut session, "install --dry-run nano"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "Dry run, nothing was changed."));
    assert!(installed(&mut session).is_empty());
}

#[test]
fn test_locked_package_is_not_installed() {
    let (system, oss) = system_with_oss();
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));

    assert_eq!(run(&mut session, "addlock nano"), ExitCode::Ok);
    let mut session = system.session();
    assert_eq!(run(&mut session, "install nano"), ExitCode::LibraryError);
    assert!(said(&session, MessageKind::Warning, "locked"));
    assert!(installed(&mut session).is_empty());
}

#[test]
fn test_update_and_patch_check() {
    let system = TestSystem::new();
    let old = system.publish("old", r#"[{"name": "vim", "version": "9.0-1"}]"#);
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} old", old));
    assert_eq!(run(&mut session, "install vim"), ExitCode::Ok);

    let mut session = system.session();
    assert_eq!(run(&mut session, "patch-check"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "0 patches needed (0 security patches)"));

    let oss = system.publish(
        "oss",
        r#"[
            {"name": "vim", "version": "9.1-1"},
            {"kind": "patch", "name": "vim-fix", "version": "1", "category": "security",
             "requires": ["vim >= 9.1-1"]}
        ]"#,
    );
    run(&mut session, &format!("addrepo -f {} oss", oss));

    let mut session = system.session();
    assert_eq!(run(&mut session, "patch-check"), ExitCode::SecurityUpdateNeeded);
    assert!(said(&session, MessageKind::Info, "1 patches needed (1 security patches)"));

    let mut session = system.session();
    assert_eq!(run(&mut session, "list-updates"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Data, "9.1-1"));

    assert_eq!(run(&mut session, "update"), ExitCode::Ok);
    let mut session = system.session();
    session.init_target().unwrap();
    let vim = session
        .target()
        .installed()
        .unwrap()
        .into_iter()
        .find(|r| r.name == "vim")
        .unwrap();
    assert_eq!(vim.edition, "9.1-1");
}

#[test]
fn test_search_and_info() {
    let (system, oss) = system_with_oss();
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));

    assert_eq!(run(&mut session, "search editor"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Data, "nano"));
    assert!(!said(&session, MessageKind::Data, "libfoo"));

    assert_eq!(run(&mut session, "info vim"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Data, "Status         : not installed"));

    assert_eq!(run(&mut session, "what-provides libfoo"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Data, "libfoo"));
}

#[test]
fn test_plus_repo_is_temporary() {
    let (system, oss) = system_with_oss();
    let mut options = system.options(true);
    options.plus_repos = vec![oss];
    let mut session = system.session_from(options, Config::default());

    assert_eq!(run(&mut session, "install nano"), ExitCode::Ok);
    assert_eq!(aliases(&session), vec!["tmp1"]);
    session.finish();
    assert!(aliases(&session).is_empty());
    assert_eq!(installed(&mut session), vec!["nano"]);
}

#[test]
fn test_unprivileged_query_survives_broken_refresh() {
    let (system, oss) = system_with_oss();
    let mut config = Config::default();
    config.main.metadata_expire_secs = 0;

    let mut session = system.session_with(config.clone(), true);
    run(&mut session, &format!("addrepo -f {} oss", oss));
    assert_eq!(run(&mut session, "refresh"), ExitCode::Ok);

    // the published index changes into garbage
    let index = oss.to_file_path().unwrap().join("index.json");
    std::fs::write(&index, "not an index").unwrap();

    let mut user = system.session_with(config.clone(), false);
    assert_eq!(run(&mut user, "search vim"), ExitCode::Ok);
    assert!(said(&user, MessageKind::Info, "is out-of-date"));
    assert!(said(&user, MessageKind::Data, "vim"));

    let mut admin = system.session_with(config, true);
    assert_eq!(run(&mut admin, "search vim"), ExitCode::LibraryError);
    assert!(said(
        &admin,
        MessageKind::Warning,
        "Disabling repository 'oss' because of the above error."
    ));
}

/// Solver that records which of its steps ran
struct RecordingSolver {
    calls: Rc<RefCell<Vec<&'static str>>>,
}

impl Solver for RecordingSolver {
    fn status(&self, pool: &ResolvablePool) -> SystemStatus {
        self.calls.borrow_mut().push("status");
        SimpleSolver.status(pool)
    }

    fn resolve(&self, pool: &mut ResolvablePool) -> pkgctl::Result<Resolution> {
        self.calls.borrow_mut().push("resolve");
        SimpleSolver.resolve(pool)
    }

    fn commit(&self, resolution: &Resolution, target: &mut dyn Target) -> pkgctl::Result<()> {
        self.calls.borrow_mut().push("commit");
        SimpleSolver.commit(resolution, target)
    }
}

#[test]
fn test_solver_status_runs_before_marking_and_queries() {
    let (system, oss) = system_with_oss();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let solver = RecordingSolver {
        calls: Rc::clone(&calls),
    };
    let mut session = system.session_with_solver(Box::new(solver));
    run(&mut session, &format!("addrepo -f {} oss", oss));
    calls.borrow_mut().clear();

    assert_eq!(run(&mut session, "install vim"), ExitCode::Ok);
    assert_eq!(*calls.borrow(), vec!["status", "resolve", "commit"]);

    let calls_for_search = Rc::new(RefCell::new(Vec::new()));
    let mut session = system.session_with_solver(Box::new(RecordingSolver {
        calls: Rc::clone(&calls_for_search),
    }));
    assert_eq!(run(&mut session, "search vim"), ExitCode::Ok);
    assert_eq!(*calls_for_search.borrow(), vec!["status"]);
}

#[test]
fn test_reverse_dependency_queries() {
    let system = TestSystem::new();
    let oss = system.publish(
        "oss",
        r#"[
            {"name": "vim", "version": "9.1-1", "requires": ["libfoo >= 2"]},
            {"name": "nano", "version": "7.2-1", "conflicts": ["libfoo < 2"]},
            {"name": "libfoo", "version": "2.0-1"}
        ]"#,
    );
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));

    let mut session = system.session();
    assert_eq!(run(&mut session, "wr libfoo"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Data, "vim"));
    assert!(!said(&session, MessageKind::Data, "nano"));

    let mut session = system.session();
    assert_eq!(run(&mut session, "what-conflicts libfoo=1"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Data, "nano"));

    let mut session = system.session();
    assert_eq!(run(&mut session, "wc libfoo>=2"), ExitCode::Ok);
    assert!(said(
        &session,
        MessageKind::Info,
        "No items conflicting with 'libfoo >= 2' found."
    ));
}

#[test]
fn test_install_new_recommends() {
    let system = TestSystem::new();
    let oss = system.publish(
        "oss",
        r#"[{"name": "vim", "version": "9.1-1", "recommends": ["vim-data"]}]"#,
    );
    let mut session = system.session();
    run(&mut session, &format!("addrepo -f {} oss", oss));
    assert_eq!(run(&mut session, "install vim"), ExitCode::Ok);

    let mut session = system.session();
    assert_eq!(run(&mut session, "inr"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "No new recommended packages found."));

    // the recommended package shows up in a new repository
    let extra = system.publish("extra", r#"[{"name": "vim-data", "version": "9.1-1"}]"#);
    run(&mut session, &format!("addrepo -f {} extra", extra));

    let mut session = system.session();
    assert_eq!(run(&mut session, "install-new-recommends"), ExitCode::Ok);
    assert_eq!(installed(&mut session), vec!["vim", "vim-data"]);
}
