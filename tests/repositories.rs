// tests/repositories.rs

//! Repository management and refresh workflows against file:// media.

mod common;

use common::{TestSystem, aliases, run, said};
use pkgctl::ExitCode;
use pkgctl::output::MessageKind;
use pkgctl::repository::locate;

const VIM: &str = r#"[{"name": "vim", "version": "9.1-1", "summary": "Vi IMproved"}]"#;

#[test]
fn test_added_repository_is_found_by_alias_number_and_uri() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let update = system.publish("update", "[]");
    let mut session = system.session();

    assert_eq!(run(&mut session, &format!("addrepo {} oss", oss)), ExitCode::Ok);
    assert_eq!(run(&mut session, &format!("ar {} update", update)), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "Repository 'oss' successfully added"));

    let known = session.store().repositories().unwrap();
    assert_eq!(locate("oss", &known).unwrap().alias, "oss");
    assert_eq!(locate("2", &known).unwrap().alias, "update");
    assert_eq!(locate(oss.as_str(), &known).unwrap().alias, "oss");
    assert!(locate("3", &known).is_none());
}

#[test]
fn test_duplicate_alias_is_rejected() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session();

    assert_eq!(run(&mut session, &format!("addrepo {} oss", oss)), ExitCode::Ok);
    assert_eq!(
        run(&mut session, &format!("addrepo {} oss", oss)),
        ExitCode::LibraryError
    );
    assert_eq!(aliases(&session), vec!["oss"]);
}

#[test]
fn test_refresh_then_clean() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session();
    run(&mut session, &format!("addrepo {} oss", oss));

    assert_eq!(run(&mut session, "refresh"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "All repositories have been refreshed."));
    let repo = session.store().repository("oss").unwrap().unwrap();
    assert!(session.metadata().is_cached(&repo));

    assert_eq!(run(&mut session, "clean --all oss"), ExitCode::Ok);
    assert!(!session.metadata().is_cached(&repo));
    assert!(session.metadata().metadata_status(&repo).is_none());
}

#[test]
fn test_refresh_with_a_broken_repository_is_partial_failure() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session();
    run(&mut session, &format!("addrepo {} oss", oss));
    let missing = oss.join("../gone/").unwrap();
    run(&mut session, &format!("addrepo -C {} gone", missing));

    assert_eq!(run(&mut session, "refresh"), ExitCode::LibraryError);
    assert!(said(
        &session,
        MessageKind::Warning,
        "Some of the repositories have not been refreshed because of an error."
    ));
    let oss = session.store().repository("oss").unwrap().unwrap();
    assert!(session.metadata().is_cached(&oss));
}

#[test]
fn test_refresh_of_only_broken_repository_fails() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session();
    let missing = oss.join("../gone/").unwrap();
    run(&mut session, &format!("addrepo -C {} gone", missing));

    assert_eq!(run(&mut session, "refresh"), ExitCode::LibraryError);
    assert!(said(
        &session,
        MessageKind::Error,
        "Could not refresh the repositories because of errors."
    ));
}

#[test]
fn test_changeable_media_is_skipped_unless_forced() {
    let system = TestSystem::new();
    let mut session = system.session();
    assert_eq!(
        run(&mut session, "addrepo -C cd:///?devices=/dev/sr0 dvd"),
        ExitCode::Ok
    );

    assert_eq!(run(&mut session, "refresh"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "changeable media"));
    let repo = session.store().repository("dvd").unwrap().unwrap();
    assert!(session.metadata().metadata_status(&repo).is_none());

    assert_ne!(run(&mut session, "refresh -f dvd"), ExitCode::Ok);
}

#[test]
fn test_removerepo_with_unknown_selector_removes_nothing() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session();
    run(&mut session, &format!("addrepo {} oss", oss));

    assert_eq!(run(&mut session, "removerepo oss ghost"), ExitCode::InvalidArgs);
    assert_eq!(aliases(&session), vec!["oss"]);
    assert_eq!(run(&mut session, "rr 1"), ExitCode::Ok);
    assert!(aliases(&session).is_empty());
}

#[test]
fn test_rename_and_modify() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session();
    run(&mut session, &format!("addrepo {} oss", oss));

    assert_eq!(run(&mut session, "renamerepo oss main"), ExitCode::Ok);
    assert_eq!(aliases(&session), vec!["main"]);

    assert_eq!(run(&mut session, "modifyrepo -d -p 10 main"), ExitCode::Ok);
    let repo = session.store().repository("main").unwrap().unwrap();
    assert!(!repo.enabled);
    assert_eq!(repo.priority, 10);
}

#[test]
fn test_unprivileged_user_cannot_add_repositories() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let mut session = system.session_with(Default::default(), false);

    assert_eq!(
        run(&mut session, &format!("addrepo {} oss", oss)),
        ExitCode::Privileges
    );
    assert!(aliases(&session).is_empty());
    // listings need no privileges
    assert_eq!(run(&mut session, "repos"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Warning, "No repositories defined."));
}

#[test]
fn test_services_manage_their_repositories() {
    let system = TestSystem::new();
    let oss = system.publish("oss", VIM);
    let service_dir = system.root().with_file_name("service");
    std::fs::create_dir_all(&service_dir).unwrap();
    std::fs::write(
        service_dir.join("repoindex.json"),
        format!(r#"{{"repositories": [{{"alias": "svc-oss", "url": "{}"}}]}}"#, oss),
    )
    .unwrap();
    let mut session = system.session();

    let uri = url::Url::from_directory_path(&service_dir).unwrap();
    assert_eq!(run(&mut session, &format!("addservice {} svc", uri)), ExitCode::Ok);
    assert_eq!(run(&mut session, "refresh-services"), ExitCode::Ok);
    assert_eq!(aliases(&session), vec!["svc-oss"]);

    assert_eq!(run(&mut session, "removeservice svc"), ExitCode::Ok);
    assert!(aliases(&session).is_empty());
}

#[test]
fn test_unprivileged_queries_on_a_fresh_system() {
    let system = TestSystem::new();
    // nothing can be created below the root
    std::fs::create_dir_all(system.root()).unwrap();
    std::fs::write(system.root().join("etc"), "").unwrap();
    std::fs::write(system.root().join("var"), "").unwrap();
    let mut session = system.session_with(Default::default(), false);

    assert_eq!(run(&mut session, "repos"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Warning, "No repositories defined."));

    let mut session = system.session_with(Default::default(), false);
    assert_eq!(run(&mut session, "search vim"), ExitCode::Ok);
    assert!(said(&session, MessageKind::Info, "No matching items found."));
}

#[test]
fn test_removeservice_with_unknown_selector() {
    let system = TestSystem::new();
    let mut session = system.session();

    assert_eq!(run(&mut session, "removeservice ghost"), ExitCode::InvalidArgs);
    assert!(said(&session, MessageKind::Error, "Service 'ghost' not found"));
    assert!(said(&session, MessageKind::Hint, "pkgctl services"));
}
