use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn shipyard() -> assert_cmd::Command {
    cargo_bin_cmd!("shipyard")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A pnpm workspace with `@acme/api` depending on `@acme/lib`.
fn monorepo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "pnpm-workspace.yaml", "packages:\n  - apps/*\n  - packages/*\n");
    write(root, "package.json", r#"{"name":"acme"}"#);
    write(
        root,
        "apps/api/package.json",
        r#"{"name":"@acme/api","dependencies":{"@acme/lib":"workspace:*","zod":"^3"}}"#,
    );
    write(root, "packages/lib/package.json", r#"{"name":"@acme/lib"}"#);
    write(root, "packages/other/package.json", r#"{"name":"@acme/other"}"#);
    write(
        root,
        "shipyard.toml",
        r#"
[services.api]
image = "acme/api:dev"

[services.api.build.pipeline]
app = "@acme/api"
cmd = ["node", "{{ app.dir }}/dist/main.js"]

[[services.api.build.pipeline.steps]]
task = "cli"
working_directory = "{{ app.dir }}"
cmd = ["pnpm", "run", "build"]

[services.script.build]
cmd = ["echo built > out.txt"]
"#,
    );
    tmp
}

// ── Help / Version ──

#[test]
fn shows_help() {
    shipyard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build container images from pnpm monorepos"));
}

#[test]
fn shows_version() {
    shipyard()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shipyard"));
}

// ── Packages ──

#[test]
fn packages_lists_workspace_sorted() {
    let repo = monorepo();
    shipyard()
        .current_dir(repo.path())
        .arg("packages")
        .assert()
        .success()
        .stdout("apps/api\t@acme/api\npackages/lib\t@acme/lib\npackages/other\t@acme/other\n");
}

#[test]
fn packages_app_lists_dependency_closure() {
    let repo = monorepo();
    shipyard()
        .args(["packages", "--app", "@acme/api", "--root"])
        .arg(repo.path())
        .assert()
        .success()
        .stdout("packages/lib\t@acme/lib\n");
}

#[test]
fn packages_without_workspace_manifest_fails() {
    let tmp = TempDir::new().unwrap();
    shipyard()
        .current_dir(tmp.path())
        .arg("packages")
        .assert()
        .failure()
        .stderr(predicate::str::contains("workspace manifest not found"));
}

// ── Plan ──

#[test]
fn plan_prints_dockerfile() {
    let repo = monorepo();
    shipyard()
        .current_dir(repo.path())
        .args(["plan", "api"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# syntax=docker/dockerfile:1.7-labs"))
        .stdout(predicate::str::contains("AS builder"))
        .stdout(predicate::str::contains(
            r#"RUN --mount=type=cache,id=pnpm-cache-9,target=/pnpm/store ["sh","-lc","cd apps/api && pnpm run build"]"#,
        ))
        .stdout(predicate::str::contains(r#"CMD ["apps/api/dist/main.js"]"#));
}

#[test]
fn plan_unknown_service_names_available_services() {
    let repo = monorepo();
    shipyard()
        .current_dir(repo.path())
        .args(["plan", "web"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api, script"));
}

#[test]
fn plan_requires_pipeline_section() {
    let repo = monorepo();
    shipyard()
        .current_dir(repo.path())
        .args(["plan", "script"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no [build.pipeline] section"));
}

#[test]
fn plan_rejects_unsupported_platform() {
    let repo = monorepo();
    let config = std::fs::read_to_string(repo.path().join("shipyard.toml")).unwrap();
    let config = config.replace(
        "app = \"@acme/api\"",
        "app = \"@acme/api\"\nplatform = \"linux/s390x\"",
    );
    std::fs::write(repo.path().join("shipyard.toml"), config).unwrap();

    shipyard()
        .current_dir(repo.path())
        .args(["plan", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("linux/s390x"));
}

// ── Build ──

#[test]
fn build_runs_direct_command() {
    let repo = monorepo();
    shipyard()
        .current_dir(repo.path())
        .args(["build", "script"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built service script"));
    let out = std::fs::read_to_string(repo.path().join("out.txt")).unwrap();
    assert_eq!(out.trim(), "built");
}

#[test]
fn build_without_config_fails() {
    let tmp = TempDir::new().unwrap();
    shipyard()
        .current_dir(tmp.path())
        .args(["build", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("service 'api' not found"));
}

// ── Resolve ──

#[test]
fn resolve_plain_text_passes_through() {
    let tmp = TempDir::new().unwrap();
    shipyard()
        .current_dir(tmp.path())
        .args(["resolve", "no placeholders here"])
        .assert()
        .success()
        .stdout("no placeholders here\n");
}

#[test]
fn resolve_unknown_placeholder_fails() {
    let tmp = TempDir::new().unwrap();
    shipyard()
        .current_dir(tmp.path())
        .args(["resolve", "{{ app.dir }}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no resolver found"));
}

#[test]
fn resolve_time_timestamp_is_numeric() {
    let tmp = TempDir::new().unwrap();
    shipyard()
        .current_dir(tmp.path())
        .args(["resolve", "{{ time.timestamp }}"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\d+\n$").unwrap());
}
