//! Pipeline tasks.
//!
//! A [`Step`] names a task kind and carries free-form options. The
//! [`TaskRegistry`] turns it into a [`Task`]; options are only read when the
//! task's commands are requested, so a malformed option surfaces at that
//! point and not at config load.

mod cli;
mod grpc;
mod setup_bun;
mod setup_pnpm;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use shipyard_core::{PipelineConfig, Placeholders, ResolverTable, Step};

use crate::error::PipelineError;

pub use cli::CliTask;
pub use grpc::GrpcGenerateTask;
pub use setup_bun::SetupBunTask;
pub use setup_pnpm::SetupPnpmTask;
pub(crate) use setup_pnpm::corepack_commands;

/// An argv vector.
pub type Command = Vec<String>;

/// Known task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    GrpcGenerateTsProto,
    SetupPnpm,
    SetupBun,
    Cli,
}

impl TaskId {
    pub const ALL: [TaskId; 4] = [
        TaskId::GrpcGenerateTsProto,
        TaskId::SetupPnpm,
        TaskId::SetupBun,
        TaskId::Cli,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GrpcGenerateTsProto => "grpc/generate/ts-proto",
            Self::SetupPnpm => "setup/pnpm",
            Self::SetupBun => "setup/bun",
            Self::Cli => "cli",
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| PipelineError::UnsupportedTask { task: s.to_owned() })
    }
}

/// Capabilities every pipeline task exposes.
pub trait Task: fmt::Debug {
    fn id(&self) -> TaskId;

    /// OS packages installed before any task command runs.
    fn required_system_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Commands run right after the system packages are installed.
    fn post_install_commands(&self) -> Result<Vec<Command>, PipelineError> {
        Ok(Vec::new())
    }

    /// Packages installed globally through the package manager.
    fn required_package_manager_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Commands this task contributes to its stage, in order.
    fn cmd(&self) -> Result<Vec<Command>, PipelineError>;
}

/// Everything a task may consult while producing commands.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub placeholders: &'a Placeholders,
    pub resolvers: &'a ResolverTable,
    pub repo_root: &'a Path,
    pub config: &'a PipelineConfig,
}

impl TaskContext<'_> {
    /// Resolves `value` against the built-ins and this pipeline's resolvers.
    pub fn resolve(&self, value: &str, what: impl FnOnce() -> String) -> Result<String, PipelineError> {
        self.placeholders
            .resolve(value, &[self.resolvers])
            .map_err(|e| PipelineError::Placeholder {
                what: what(),
                source: e,
            })
    }
}

type TaskConstructor = for<'a> fn(&'a Step, TaskContext<'a>) -> Box<dyn Task + 'a>;

/// Maps task kinds to their constructors.
#[derive(Clone)]
pub struct TaskRegistry {
    constructors: Vec<(TaskId, TaskConstructor)>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.constructors.iter().map(|(id, _)| id))
            .finish()
    }
}

const BUILTIN_TASKS: [(TaskId, TaskConstructor); 4] = [
    (TaskId::GrpcGenerateTsProto, grpc::construct),
    (TaskId::SetupPnpm, setup_pnpm::construct),
    (TaskId::SetupBun, setup_bun::construct),
    (TaskId::Cli, cli::construct),
];

impl Default for TaskRegistry {
    fn default() -> Self {
        Self {
            constructors: BUILTIN_TASKS.to_vec(),
        }
    }
}

impl TaskRegistry {
    /// Builds the task for `step`. Options are not validated here.
    pub fn create<'a>(
        &self,
        step: &'a Step,
        ctx: TaskContext<'a>,
    ) -> Result<Box<dyn Task + 'a>, PipelineError> {
        let id: TaskId = step.task.parse()?;
        let (_, construct) = self
            .constructors
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .ok_or_else(|| PipelineError::UnsupportedTask {
                task: step.task.clone(),
            })?;
        Ok(construct(step, ctx))
    }
}

// ── Option helpers ──

fn invalid(step: &Step, key: &'static str, reason: &str) -> PipelineError {
    PipelineError::InvalidOption {
        task: step.task.clone(),
        key,
        reason: reason.to_owned(),
    }
}

fn missing(step: &Step, key: &'static str) -> PipelineError {
    PipelineError::MissingOption {
        task: step.task.clone(),
        key,
    }
}

/// Optional string option.
pub(crate) fn string_option(step: &Step, key: &'static str) -> Result<Option<String>, PipelineError> {
    match step.extra.get(key) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(step, key, "must be a string")),
    }
}

pub(crate) fn required_string(step: &Step, key: &'static str) -> Result<String, PipelineError> {
    string_option(step, key)?.ok_or_else(|| missing(step, key))
}

/// Optional list-of-strings option.
pub(crate) fn string_list_option(
    step: &Step,
    key: &'static str,
) -> Result<Option<Vec<String>>, PipelineError> {
    let Some(value) = step.extra.get(key) else {
        return Ok(None);
    };
    let serde_json::Value::Array(items) = value else {
        return Err(invalid(step, key, "must be a list of strings"));
    };
    items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(s.clone()),
            _ => Err(invalid(step, key, "must be a list of strings")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

pub(crate) fn required_string_list(step: &Step, key: &'static str) -> Result<Vec<String>, PipelineError> {
    string_list_option(step, key)?.ok_or_else(|| missing(step, key))
}

fn argv<const N: usize>(parts: [&str; N]) -> Command {
    parts.iter().map(|p| (*p).to_owned()).collect()
}
