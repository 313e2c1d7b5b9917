use shipyard_core::Step;

use super::{Command, Task, TaskContext, TaskId};
use crate::error::PipelineError;

/// Activates the configured pnpm version through corepack.
#[derive(Debug)]
pub struct SetupPnpmTask<'a> {
    ctx: TaskContext<'a>,
}

pub(super) fn construct<'a>(_step: &'a Step, ctx: TaskContext<'a>) -> Box<dyn Task + 'a> {
    Box::new(SetupPnpmTask { ctx })
}

impl<'a> SetupPnpmTask<'a> {
    pub fn new(ctx: TaskContext<'a>) -> Self {
        Self { ctx }
    }
}

/// `corepack enable` followed by `corepack prepare pnpm@<version> --activate`.
pub(crate) fn corepack_commands(version: &str) -> Vec<Command> {
    vec![
        super::argv(["corepack", "enable"]),
        vec![
            "corepack".to_owned(),
            "prepare".to_owned(),
            format!("pnpm@{version}"),
            "--activate".to_owned(),
        ],
    ]
}

impl Task for SetupPnpmTask<'_> {
    fn id(&self) -> TaskId {
        TaskId::SetupPnpm
    }

    fn cmd(&self) -> Result<Vec<Command>, PipelineError> {
        Ok(corepack_commands(&self.ctx.config.package_manager_version))
    }
}
