use std::path::Path;

use shipyard_core::{BuildStrategy, Platform, ShipyardConfig};
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = ShipyardConfig::load(tmp.path()).unwrap();
    assert!(config.services.is_empty());
}

#[test]
fn load_parses_pipeline_service() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[services.api]
image = "ghcr.io/acme/api:{{ git.commit }}"

[services.api.build.pipeline]
app = "api"
root = "../.."
extra_files = ["config/production.json"]
exclude_files = ["**/*.test.ts"]
platform = "linux/arm64"
cmd = ["node", "{{ app.dir }}/dist/main.js"]

[[services.api.build.pipeline.steps]]
task = "setup/pnpm"

[[services.api.build.pipeline.steps]]
task = "cli"
working_directory = "{{ app.dir }}"
cmd = ["pnpm", "run", "build"]

[[services.api.build.pipeline.runtime_steps]]
task = "setup/bun"
version = "1.1.0"
"#;
    std::fs::write(tmp.path().join("shipyard.toml"), toml).unwrap();

    let config = ShipyardConfig::load(tmp.path()).unwrap();
    let service = config.service("api").unwrap();
    assert_eq!(service.image, "ghcr.io/acme/api:{{ git.commit }}");

    let build = service.build.as_ref().unwrap();
    let Some(BuildStrategy::Pipeline(pipeline)) = build.strategy() else {
        panic!("expected pipeline strategy");
    };
    assert_eq!(pipeline.runtime_version, "22");
    assert_eq!(pipeline.package_manager_version, "9");
    assert_eq!(pipeline.base_image(), "node:22-alpine");
    assert_eq!(pipeline.app, "api");
    assert_eq!(pipeline.repo_root(Path::new("/work/svc")), Path::new("/work/svc/../.."));
    assert_eq!(pipeline.extra_files, vec!["config/production.json"]);
    assert_eq!(pipeline.exclude_files, vec!["**/*.test.ts"]);
    assert_eq!(
        Platform::parse(pipeline.platform.as_deref().unwrap_or_default()),
        Some(Platform::LinuxArm64)
    );

    assert_eq!(pipeline.steps.len(), 2);
    assert_eq!(pipeline.steps[0].task, "setup/pnpm");
    assert!(pipeline.steps[0].extra.is_empty());
    assert_eq!(pipeline.steps[1].working_directory.as_deref(), Some("{{ app.dir }}"));
    assert_eq!(
        pipeline.steps[1].extra["cmd"],
        serde_json::json!(["pnpm", "run", "build"])
    );
    assert_eq!(pipeline.runtime_steps[0].extra["version"], "1.1.0");
}

#[test]
fn load_parses_command_service() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[services.web]
image = "web:latest"

[services.web.build]
cmd = ["docker build -t web:latest ."]
dir = "frontend"
env = { GIT_BRANCH = "{{ git.branch }}" }
"#;
    std::fs::write(tmp.path().join("shipyard.toml"), toml).unwrap();

    let config = ShipyardConfig::load(tmp.path()).unwrap();
    let build = config.service("web").unwrap().build.as_ref().unwrap();
    let Some(BuildStrategy::Command(command)) = build.strategy() else {
        panic!("expected command strategy");
    };
    assert_eq!(command.cmd, vec!["docker build -t web:latest ."]);
    assert_eq!(command.dir.as_deref(), Some(Path::new("frontend")));
    assert_eq!(command.env["GIT_BRANCH"], "{{ git.branch }}");
}

#[test]
fn unknown_service_lists_configured_ones() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("shipyard.toml"),
        "[services.api]\nimage = \"a\"\n[services.web]\nimage = \"b\"\n",
    )
    .unwrap();

    let config = ShipyardConfig::load(tmp.path()).unwrap();
    let err = config.service("worker").unwrap_err();
    assert!(err.is_bad_user_input());
    let msg = err.to_string();
    assert!(msg.contains("worker"), "got: {msg}");
    assert!(msg.contains("api, web"), "got: {msg}");
}

#[test]
fn invalid_toml_is_bad_user_input() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("shipyard.toml"), "[services.api\n").unwrap();
    let err = ShipyardConfig::load(tmp.path()).unwrap_err();
    assert!(err.is_bad_user_input());
    assert!(err.to_string().contains("shipyard.toml"), "got: {err}");
}
