//! Integration tests for aptdeck-core
//!
//! These tests drive complete workflows end-to-end: settings are read from a
//! YAML file, the package manager and elevation wrapper are replaced with
//! small `sh` scripts, and actions run through the command runner.

use aptdeck_core::{
    actions::PackageAction,
    catalog::{search, CatalogLoader, PackageRecord},
    config::Settings,
    credential::Secret,
    error::Error,
    file_handling::get_settings,
    runner::{CommandRunner, ExecuteOptions, ExecutionOutcome, ExecutionState},
};
use std::io::Write;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tempfile::NamedTempFile;

const TIMEOUT: Duration = Duration::from_secs(10);

fn settings_from_yaml(yaml_content: &str) -> Settings {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{yaml_content}").unwrap();
    get_settings(temp_file.path().to_str().unwrap()).unwrap()
}

/// Runs `argv` and returns every streamed line plus the outcome.
fn run_to_end(
    runner: &CommandRunner,
    argv: Vec<String>,
    options: ExecuteOptions,
) -> (Vec<String>, ExecutionOutcome) {
    let (line_tx, line_rx) = channel();
    let (done_tx, done_rx) = channel();
    let options = options
        .on_line(move |line| {
            let _ = line_tx.send(line);
        })
        .on_done(move |outcome| {
            let _ = done_tx.send(outcome);
        });

    runner.execute(argv, options).unwrap();
    let outcome = done_rx.recv_timeout(TIMEOUT).unwrap();

    (drain(&line_rx), outcome)
}

fn drain(rx: &Receiver<String>) -> Vec<String> {
    rx.try_iter().collect()
}

const FAKE_SYSTEM: &str = r#"
query_command: ["sh", "-c", "printf 'bash 5.2\nnginx 1.22.1\nnginx-common 1.22.1\nbroken-line\n'"]
elevation:
  command: ["sh", "-c", "read pw; echo \"auth:$pw\"; exec \"$@\"", "fake-sudo"]
  reads_credential: true
actions:
  install: ["echo", "installing", "{package}"]
  upgrade: ["echo", "upgrading", "{package}"]
  remove: ["sh", "-c", "echo removing $0; echo 'E: dpkg was interrupted' >&2; exit 100", "{package}"]
  update: ["echo", "Reading package lists... Done"]
environment:
  DEBIAN_FRONTEND: noninteractive
"#;

/// Load, search, act, reload: the cycle a presentation layer drives.
#[test]
fn test_catalog_then_upgrade_workflow() {
    let settings = settings_from_yaml(FAKE_SYSTEM);

    let loader = CatalogLoader::from_settings(&settings);
    let packages = loader.load_installed_packages().unwrap();
    assert_eq!(packages.len(), 3);

    let matches = search("NGINX", &packages);
    assert_eq!(
        matches.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["nginx", "nginx-common"]
    );

    let action = PackageAction::Upgrade(matches[0].name.clone());
    assert!(PackageAction::needs_credential(&settings));
    let argv = action.argv(&settings).unwrap();

    let runner = CommandRunner::new();
    let (lines, outcome) = run_to_end(
        &runner,
        argv,
        ExecuteOptions::new().secret(Secret::new("hunter2")),
    );

    assert_eq!(lines, vec!["auth:hunter2", "upgrading nginx"]);
    assert_eq!(outcome, ExecutionOutcome::Completed { exit_code: 0 });

    // The list is replaced, not patched.
    let reloaded = loader.load_installed_packages().unwrap();
    assert_eq!(reloaded, packages);
}

/// A failing action streams its error output and reports the exit code.
#[test]
fn test_failing_remove_reports_exit_code() {
    let settings = settings_from_yaml(FAKE_SYSTEM);
    let argv = PackageAction::Remove("nginx".to_string())
        .argv(&settings)
        .unwrap();

    let runner = CommandRunner::new();
    let (lines, outcome) = run_to_end(
        &runner,
        argv,
        ExecuteOptions::new().secret(Secret::new("pw")),
    );

    assert_eq!(
        lines,
        vec!["auth:pw", "removing nginx", "E: dpkg was interrupted"]
    );
    assert_eq!(outcome, ExecutionOutcome::Completed { exit_code: 100 });
    assert!(!outcome.is_success());
}

/// Configured environment variables reach the launched process.
#[test]
fn test_environment_from_settings() {
    let settings = settings_from_yaml(FAKE_SYSTEM);
    let environment = settings.environment.clone().unwrap();

    let runner = CommandRunner::new();
    let (lines, _) = run_to_end(
        &runner,
        vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo $DEBIAN_FRONTEND".to_string(),
        ],
        ExecuteOptions::new().envs(environment),
    );

    assert_eq!(lines, vec!["noninteractive"]);
}

/// A query that fails surfaces its error text untouched apart from trimming.
#[test]
fn test_query_failure_workflow() {
    let settings = settings_from_yaml(
        r#"
query_command: ["sh", "-c", "echo 'permission denied' >&2; exit 1"]
"#,
    );

    let result = CatalogLoader::from_settings(&settings).load_installed_packages();
    match result {
        Err(Error::QueryFailed(text)) => assert_eq!(text, "permission denied"),
        other => panic!("expected QueryFailed, got {other:?}"),
    }
}

/// Only one action runs at a time; the first is unaffected by the rejection.
#[test]
fn test_actions_are_serialized() {
    let runner = CommandRunner::new();
    let (line_tx, line_rx) = channel();
    let (done_tx, done_rx) = channel();

    let handle = runner
        .execute(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo started; exec sleep 30".to_string(),
            ],
            ExecuteOptions::new()
                .on_line(move |line| {
                    let _ = line_tx.send(line);
                })
                .on_done(move |outcome| {
                    let _ = done_tx.send(outcome);
                }),
        )
        .unwrap();
    assert_eq!(line_rx.recv_timeout(TIMEOUT).unwrap(), "started");

    let settings = Settings {
        elevation: None,
        ..Settings::default()
    };
    let argv = PackageAction::UpdateIndex.argv(&settings).unwrap();
    assert!(matches!(
        runner.execute(argv, ExecuteOptions::new()),
        Err(Error::Busy)
    ));
    assert_eq!(handle.state(), ExecutionState::Running);

    assert!(runner.cancel());
    assert_eq!(
        done_rx.recv_timeout(TIMEOUT).unwrap(),
        ExecutionOutcome::Cancelled
    );
    assert!(drain(&line_rx).is_empty());
    assert!(!runner.is_running());
}

/// Records keep their input order through parse and search.
#[test]
fn test_search_preserves_catalog_order() {
    let packages: Vec<PackageRecord> = aptdeck_core::catalog::parse_catalog(
        "zsh 5.9\nlibz3-4 4.8\nzlib1g 1.2\nbash 5.2\n",
    );

    let names: Vec<String> = search("z", &packages)
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["zsh", "libz3-4", "zlib1g"]);
}
