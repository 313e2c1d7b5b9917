use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::dockerfile::{DockerfileRenderer, gitignore_excludes};
use super::{BuildEngine, BuildPlan};
use crate::error::EngineError;

/// Directory under the build context that holds the generated Dockerfile.
pub const STATE_DIR: &str = ".shipyard";

/// Builds a [`BuildPlan`] with `docker buildx`, loading the result into the
/// local image store.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    program: String,
}

impl Default for DockerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerEngine {
    pub fn new() -> Self {
        Self {
            program: "docker".to_owned(),
        }
    }

    /// Use a different docker-compatible CLI (e.g. `podman`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The Dockerfile this engine would build, with the context's
    /// `.gitignore` applied.
    pub async fn render(&self, plan: &BuildPlan) -> Result<String, EngineError> {
        let excludes = read_gitignore(&plan.context).await?;
        Ok(DockerfileRenderer::new(plan)
            .with_ignore_excludes(excludes)
            .render())
    }

    /// Renders the plan and writes it to `<context>/.shipyard/Dockerfile`.
    pub async fn write_dockerfile(&self, plan: &BuildPlan) -> Result<PathBuf, EngineError> {
        let content = self.render(plan).await?;

        let dir = plan.context.join(STATE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EngineError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;

        let path = dir.join("Dockerfile");
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| EngineError::WriteDockerfile {
                path: path.clone(),
                source: e,
            })?;
        tracing::debug!(path = %path.display(), "wrote Dockerfile");
        Ok(path)
    }

    fn build_args(plan: &BuildPlan, dockerfile: &Path, image: &str) -> Vec<String> {
        vec![
            "buildx".to_owned(),
            "build".to_owned(),
            "--file".to_owned(),
            dockerfile.display().to_string(),
            "--platform".to_owned(),
            plan.platform.to_string(),
            "--output".to_owned(),
            format!("type=docker,name={image}"),
            plan.context.display().to_string(),
        ]
    }
}

impl BuildEngine for DockerEngine {
    async fn export(&self, plan: &BuildPlan, image: &str) -> Result<(), EngineError> {
        let dockerfile = self.write_dockerfile(plan).await?;
        let args = Self::build_args(plan, &dockerfile, image);
        tracing::info!(program = %self.program, ?args, "starting image build");

        // Dropping the future kills the build.
        let status = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| EngineError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::BuildFailed {
                image: image.to_owned(),
                status: status.to_string(),
            })
        }
    }
}

async fn read_gitignore(context: &Path) -> Result<Vec<String>, EngineError> {
    let path = context.join(shipyard_core::walk::IGNORE_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(gitignore_excludes(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(EngineError::ReadIgnoreFile { path, source: e }),
    }
}
