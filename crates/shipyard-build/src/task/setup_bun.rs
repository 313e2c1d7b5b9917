use shipyard_core::Step;

use super::{Command, Task, TaskContext, TaskId, argv, required_string};
use crate::error::PipelineError;

const INSTALLER_URL: &str = "https://bun.sh/install";
const INSTALLER_PATH: &str = "/tmp/bun-install.sh";

/// Installs bun at a pinned `version` and links it into `/usr/local/bin`.
#[derive(Debug)]
pub struct SetupBunTask<'a> {
    step: &'a Step,
}

pub(super) fn construct<'a>(step: &'a Step, _ctx: TaskContext<'a>) -> Box<dyn Task + 'a> {
    Box::new(SetupBunTask { step })
}

impl<'a> SetupBunTask<'a> {
    pub fn new(step: &'a Step) -> Self {
        Self { step }
    }
}

impl Task for SetupBunTask<'_> {
    fn id(&self) -> TaskId {
        TaskId::SetupBun
    }

    fn required_system_packages(&self) -> Vec<String> {
        vec!["curl".to_owned(), "unzip".to_owned(), "bash".to_owned()]
    }

    fn post_install_commands(&self) -> Result<Vec<Command>, PipelineError> {
        let version = required_string(self.step, "version")?;
        Ok(vec![
            argv(["curl", "-fsSL", INSTALLER_URL, "-o", INSTALLER_PATH]),
            vec!["bash".to_owned(), INSTALLER_PATH.to_owned(), version],
            argv(["ln", "-sf", "/root/.bun/bin/bun", "/usr/local/bin/bun"]),
            argv(["ln", "-sf", "/usr/local/bin/bun", "/usr/local/bin/bunx"]),
        ])
    }

    fn cmd(&self) -> Result<Vec<Command>, PipelineError> {
        Ok(Vec::new())
    }
}
