use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use shipyard_core::{BuildConfig, Placeholders};

use crate::error::CommandBuildError;

/// A fully resolved direct build command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub dir: PathBuf,
}

/// Builds an image by running the service's own command on the host.
#[derive(Debug)]
pub struct CommandBuilder<'a> {
    config: &'a BuildConfig,
    project_dir: &'a Path,
    placeholders: &'a Placeholders,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a BuildConfig, project_dir: &'a Path, placeholders: &'a Placeholders) -> Self {
        Self {
            config,
            project_dir,
            placeholders,
        }
    }

    /// Resolves placeholders in every token and env value.
    ///
    /// A single token is treated as a shell script and run through `sh -c`.
    pub fn resolved_command(&self) -> Result<ResolvedCommand, CommandBuildError> {
        if self.config.cmd.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }

        let mut tokens = Vec::with_capacity(self.config.cmd.len());
        for token in &self.config.cmd {
            tokens.push(self.resolve(token, || format!("build cmd token '{token}'"))?);
        }

        let mut env = BTreeMap::new();
        for (key, value) in &self.config.env {
            env.insert(
                key.clone(),
                self.resolve(value, || format!("build env {key}"))?,
            );
        }

        let (program, args) = if tokens.len() == 1 {
            ("sh".to_owned(), vec!["-c".to_owned(), tokens.remove(0)])
        } else {
            let program = tokens.remove(0);
            (program, tokens)
        };

        let dir = match &self.config.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.project_dir.join(dir),
            None => self.project_dir.to_path_buf(),
        };

        Ok(ResolvedCommand {
            program,
            args,
            env,
            dir,
        })
    }

    /// Runs the command with inherited stdio.
    ///
    /// Dropping the returned future kills the child.
    pub async fn run(&self) -> Result<(), CommandBuildError> {
        let command = self.resolved_command()?;
        tracing::info!(
            program = %command.program,
            args = ?command.args,
            dir = %command.dir.display(),
            "running build command"
        );

        let status = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .current_dir(&command.dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| CommandBuildError::Spawn {
                program: command.program.clone(),
                source: e,
            })?;

        if status.success() {
            tracing::info!(program = %command.program, "build command finished");
            Ok(())
        } else {
            Err(CommandBuildError::Failed {
                program: command.program,
                status: status.to_string(),
            })
        }
    }

    fn resolve(&self, value: &str, what: impl FnOnce() -> String) -> Result<String, CommandBuildError> {
        self.placeholders
            .resolve(value, &[])
            .map_err(|e| CommandBuildError::Placeholder {
                what: what(),
                source: e,
            })
    }
}
