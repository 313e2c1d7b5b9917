use shipyard_core::Step;

use super::{Command, Task, TaskContext, TaskId, required_string_list, string_option};
use crate::error::PipelineError;

/// Runs arbitrary commands from a working directory via `sh -lc`.
///
/// Options: `cmd` (required list), `workdir` (default `.`). The step's
/// `working_directory` takes precedence over `workdir`.
#[derive(Debug)]
pub struct CliTask<'a> {
    step: &'a Step,
    ctx: TaskContext<'a>,
}

pub(super) fn construct<'a>(step: &'a Step, ctx: TaskContext<'a>) -> Box<dyn Task + 'a> {
    Box::new(CliTask { step, ctx })
}

impl<'a> CliTask<'a> {
    pub fn new(step: &'a Step, ctx: TaskContext<'a>) -> Self {
        Self { step, ctx }
    }

    fn workdir(&self) -> Result<String, PipelineError> {
        let workdir = match &self.step.working_directory {
            Some(dir) => dir.clone(),
            None => match string_option(self.step, "workdir")? {
                Some(dir) => dir,
                None => ".".to_owned(),
            },
        };
        self.ctx
            .resolve(&workdir, || format!("workdir '{workdir}' of task {}", self.step.task))
    }
}

impl Task for CliTask<'_> {
    fn id(&self) -> TaskId {
        TaskId::Cli
    }

    fn cmd(&self) -> Result<Vec<Command>, PipelineError> {
        let parts = required_string_list(self.step, "cmd")?;
        let mut script = vec!["cd".to_owned(), self.workdir()?, "&&".to_owned()];
        for part in &parts {
            script.push(
                self.ctx
                    .resolve(part, || format!("cmd part '{part}' of task {}", self.step.task))?,
            );
        }

        Ok(vec![vec!["sh".to_owned(), "-lc".to_owned(), script.join(" ")]])
    }
}
