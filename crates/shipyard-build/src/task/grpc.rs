use shipyard_core::walk::normalize_pattern;
use shipyard_core::{EntryFilter, PatternSet, RepoWalker, Step};

use super::{Command, Task, TaskContext, TaskId, argv, required_string_list, string_list_option, string_option};
use crate::error::PipelineError;

/// Compiles `.proto` files into TypeScript with `protoc` and ts-proto.
///
/// Options: `include` (required `.proto` globs), `exclude`, `out` (required,
/// placeholders allowed), `opt` (passed as `--ts_proto_opt`).
#[derive(Debug)]
pub struct GrpcGenerateTask<'a> {
    step: &'a Step,
    ctx: TaskContext<'a>,
}

pub(super) fn construct<'a>(step: &'a Step, ctx: TaskContext<'a>) -> Box<dyn Task + 'a> {
    Box::new(GrpcGenerateTask { step, ctx })
}

impl<'a> GrpcGenerateTask<'a> {
    pub fn new(step: &'a Step, ctx: TaskContext<'a>) -> Self {
        Self { step, ctx }
    }

    fn include_patterns(&self) -> Result<Vec<String>, PipelineError> {
        let patterns: Vec<String> = required_string_list(self.step, "include")?
            .iter()
            .map(|p| normalize_pattern(p))
            .collect();
        if let Some(bad) = patterns.iter().find(|p| !p.ends_with(".proto")) {
            return Err(PipelineError::InvalidOption {
                task: self.step.task.clone(),
                key: "include",
                reason: format!("must point to .proto files, got: {bad}"),
            });
        }
        Ok(patterns)
    }

    fn out_dir(&self) -> Result<String, PipelineError> {
        let Some(out) = string_option(self.step, "out")? else {
            return Err(PipelineError::MissingOption {
                task: self.step.task.clone(),
                key: "out",
            });
        };
        if out.is_empty() {
            return Err(PipelineError::InvalidOption {
                task: self.step.task.clone(),
                key: "out",
                reason: "must be a non-empty string".to_owned(),
            });
        }
        self.ctx
            .resolve(&out, || format!("'out' of task {}", self.step.task))
    }

    /// Repo-relative `.proto` files, discovered with the workspace walk rules.
    fn proto_files(&self, include: &[String], exclude: &[String]) -> Result<Vec<String>, PipelineError> {
        let include = PatternSet::new(include)?;
        let exclude = PatternSet::new(exclude)?;
        let walker = RepoWalker::open(self.ctx.repo_root)?;
        let files: Vec<String> = walker
            .walk(&include, &exclude, EntryFilter::Files)?
            .into_iter()
            .map(|entry| entry.rel_path)
            .collect();
        tracing::info!(count = files.len(), ?files, "found proto files");
        Ok(files)
    }
}

impl Task for GrpcGenerateTask<'_> {
    fn id(&self) -> TaskId {
        TaskId::GrpcGenerateTsProto
    }

    fn required_system_packages(&self) -> Vec<String> {
        vec!["protobuf".to_owned(), "protobuf-dev".to_owned()]
    }

    fn post_install_commands(&self) -> Result<Vec<Command>, PipelineError> {
        Ok(vec![
            argv(["mkdir", "-p", "/usr/local/include/google"]),
            argv([
                "ln",
                "-s",
                "/usr/include/google/protobuf",
                "/usr/local/include/google/protobuf",
            ]),
        ])
    }

    fn required_package_manager_packages(&self) -> Vec<String> {
        vec!["ts-proto".to_owned()]
    }

    fn cmd(&self) -> Result<Vec<Command>, PipelineError> {
        let include = self.include_patterns()?;
        let exclude: Vec<String> = string_list_option(self.step, "exclude")?
            .into_iter()
            .flatten()
            .map(|p| normalize_pattern(&p))
            .collect();
        let out = self.out_dir()?;
        let options: Vec<String> = string_list_option(self.step, "opt")?
            .into_iter()
            .flatten()
            .collect();
        tracing::debug!(?include, ?exclude, %out, ?options, "grpc generate options");

        let files = self.proto_files(&include, &exclude)?;

        let mut protoc = vec!["protoc".to_owned()];
        protoc.extend(options.iter().map(|opt| format!("--ts_proto_opt={opt}")));
        protoc.push(format!("--ts_proto_out={out}"));
        protoc.push("--proto_path=/usr/local/include".to_owned());
        protoc.push("--proto_path=.".to_owned());
        protoc.extend(files);

        Ok(vec![
            vec!["mkdir".to_owned(), "-p".to_owned(), out],
            protoc,
        ])
    }
}
