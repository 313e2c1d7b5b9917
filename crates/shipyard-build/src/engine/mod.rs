//! Declarative build plan and the engine seam that executes it.
//!
//! The pipeline only describes stages as ordered [`Operation`]s; an engine
//! turns the plan into an image. Every stage is built on a base image, and
//! the last stage of a [`BuildPlan`] is the one exported.

mod docker;
mod dockerfile;

use std::path::PathBuf;

use shipyard_core::Platform;

use crate::error::EngineError;

pub use docker::{DockerEngine, STATE_DIR};
pub use dockerfile::{DockerfileRenderer, gitignore_excludes};

/// Where a copy reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// The build context on the host (the repository root)
    Host,
    /// The filesystem of an earlier stage
    Stage(String),
}

/// Copy of a directory tree, optionally narrowed to `include` paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    pub source: CopySource,
    /// Directory inside the source; `.` for the host context
    pub from_path: String,
    pub dest: String,
    /// Paths relative to `from_path`; empty copies the whole directory.
    /// Listed paths that do not exist are skipped.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Also exclude whatever the root `.gitignore` ignores
    pub gitignore: bool,
}

impl CopySpec {
    /// Whole host context into `dest`.
    pub fn host(dest: impl Into<String>) -> Self {
        Self {
            source: CopySource::Host,
            from_path: ".".to_owned(),
            dest: dest.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            gitignore: false,
        }
    }

    /// `from_path` of stage `stage` into `dest`.
    pub fn stage(stage: impl Into<String>, from_path: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: CopySource::Stage(stage.into()),
            from_path: from_path.into(),
            dest: dest.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            gitignore: false,
        }
    }

    pub fn include<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_gitignore(mut self) -> Self {
        self.gitignore = true;
        self
    }
}

/// One step of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Workdir(String),
    /// With `expand`, `$VAR` references in `value` are expanded.
    Env {
        key: String,
        value: String,
        expand: bool,
    },
    /// Persistent cache mounted for every later `Exec` in the stage
    MountCache { id: String, target: String },
    Exec(Vec<String>),
    Copy(CopySpec),
    Entrypoint(Vec<String>),
    DefaultArgs(Vec<String>),
}

/// A named stage built from `base_image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub base_image: String,
    pub ops: Vec<Operation>,
}

impl Stage {
    pub fn new(name: impl Into<String>, base_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_image: base_image.into(),
            ops: Vec::new(),
        }
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.ops.push(Operation::Workdir(dir.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(Operation::Env {
            key: key.into(),
            value: value.into(),
            expand: false,
        });
        self
    }

    pub fn env_expanded(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(Operation::Env {
            key: key.into(),
            value: value.into(),
            expand: true,
        });
        self
    }

    pub fn mount_cache(mut self, id: impl Into<String>, target: impl Into<String>) -> Self {
        self.ops.push(Operation::MountCache {
            id: id.into(),
            target: target.into(),
        });
        self
    }

    pub fn exec(mut self, argv: Vec<String>) -> Self {
        self.ops.push(Operation::Exec(argv));
        self
    }

    pub fn exec_all<I: IntoIterator<Item = Vec<String>>>(mut self, commands: I) -> Self {
        self.ops.extend(commands.into_iter().map(Operation::Exec));
        self
    }

    pub fn copy(mut self, spec: CopySpec) -> Self {
        self.ops.push(Operation::Copy(spec));
        self
    }

    pub fn entrypoint(mut self, argv: Vec<String>) -> Self {
        self.ops.push(Operation::Entrypoint(argv));
        self
    }

    pub fn default_args(mut self, args: Vec<String>) -> Self {
        self.ops.push(Operation::DefaultArgs(args));
        self
    }

    /// The `Exec` operations of this stage, in order.
    pub fn execs(&self) -> impl Iterator<Item = &[String]> {
        self.ops.iter().filter_map(|op| match op {
            Operation::Exec(argv) => Some(argv.as_slice()),
            _ => None,
        })
    }
}

/// Stages in build order; the last one is exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub platform: Platform,
    /// Host build context (the repository root)
    pub context: PathBuf,
    pub stages: Vec<Stage>,
}

impl BuildPlan {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Executes a [`BuildPlan`] and exports its final stage as an image.
///
/// Production code uses [`DockerEngine`], tests use mockall-generated mocks.
/// Dropping the returned future must stop any in-flight build.
#[allow(async_fn_in_trait)]
pub trait BuildEngine: Send + Sync {
    async fn export(&self, plan: &BuildPlan, image: &str) -> Result<(), EngineError>;
}
