use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shipyard_build::{CommandBuildError, CommandBuilder};
use shipyard_core::{BuildConfig, ErrorKind, GitRepositoryInfo, Placeholders};
use tempfile::TempDir;

struct FakeGit;

impl GitRepositoryInfo for FakeGit {
    fn current_branch(&self) -> shipyard_core::Result<String> {
        Ok("feature/login".to_owned())
    }
    fn current_commit(&self) -> shipyard_core::Result<String> {
        Ok("deadbeefcafe".to_owned())
    }
    fn current_tag(&self) -> shipyard_core::Result<Option<String>> {
        Ok(Some("v2.0.0".to_owned()))
    }
}

fn placeholders() -> Placeholders {
    Placeholders::new(Arc::new(FakeGit))
}

fn config(cmd: &[&str]) -> BuildConfig {
    BuildConfig {
        cmd: cmd.iter().map(|s| (*s).to_owned()).collect(),
        ..Default::default()
    }
}

#[test]
fn multi_token_command_runs_directly() {
    let placeholders = placeholders();
    let mut build = config(&["docker", "build", "-t", "api:{{ git.tag }}", "."]);
    build.env = BTreeMap::from([(
        "BRANCH".to_owned(),
        "{{ git.branch | replace_all('/', '-') }}".to_owned(),
    )]);
    build.dir = Some(PathBuf::from("services/api"));

    let resolved = CommandBuilder::new(&build, Path::new("/work"), &placeholders)
        .resolved_command()
        .unwrap();
    assert_eq!(resolved.program, "docker");
    assert_eq!(resolved.args, vec!["build", "-t", "api:v2.0.0", "."]);
    assert_eq!(resolved.env["BRANCH"], "feature-login");
    assert_eq!(resolved.dir, Path::new("/work/services/api"));
}

#[test]
fn single_token_runs_through_shell() {
    let placeholders = placeholders();
    let build = config(&["make image TAG={{ git.commit }}"]);
    let resolved = CommandBuilder::new(&build, Path::new("/work"), &placeholders)
        .resolved_command()
        .unwrap();
    assert_eq!(resolved.program, "sh");
    assert_eq!(resolved.args, vec!["-c", "make image TAG=deadbeefcafe"]);
    assert_eq!(resolved.dir, Path::new("/work"));
}

#[test]
fn empty_command_is_bad_user_input() {
    let placeholders = placeholders();
    let build = BuildConfig::default();
    let err = CommandBuilder::new(&build, Path::new("."), &placeholders)
        .resolved_command()
        .unwrap_err();
    assert!(matches!(err, CommandBuildError::EmptyCommand));
    assert!(err.is_bad_user_input());
}

#[test]
fn pipeline_resolvers_are_not_available() {
    let placeholders = placeholders();
    let build = config(&["echo", "{{ app.dir }}"]);
    let err = CommandBuilder::new(&build, Path::new("."), &placeholders)
        .resolved_command()
        .unwrap_err();
    assert!(matches!(err, CommandBuildError::Placeholder { .. }));
    assert!(err.is_bad_user_input());
}

#[tokio::test]
async fn run_reports_exit_status() {
    let tmp = TempDir::new().unwrap();
    let placeholders = placeholders();

    let build = config(&["touch built-{{ git.tag }}"]);
    CommandBuilder::new(&build, tmp.path(), &placeholders)
        .run()
        .await
        .unwrap();
    assert!(tmp.path().join("built-v2.0.0").is_file());

    let build = config(&["exit 3"]);
    let err = CommandBuilder::new(&build, tmp.path(), &placeholders)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, CommandBuildError::Failed { ref program, .. } if program == "sh"));
    assert_eq!(err.kind(), ErrorKind::Operational);
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let tmp = TempDir::new().unwrap();
    let placeholders = placeholders();
    let build = config(&["shipyard-definitely-missing-binary", "--version"]);
    let err = CommandBuilder::new(&build, tmp.path(), &placeholders)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, CommandBuildError::Spawn { .. }), "got: {err:?}");
}
