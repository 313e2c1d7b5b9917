//! Pipeline tasks, build plans and image assembly for shipyard.
//!
//! # Build flow
//!
//! ```text
//! shipyard build <service>
//!   1. Strategy   ── build.cmd set?  CommandBuilder : PipelineService
//!   2. Workspace  ── pnpm-workspace.yaml → packages → app dependency closure
//!   3. Steps      ── TaskRegistry turns steps into packages and commands
//!   4. Plan       ── builder → deps → runtime stages
//!   5. Engine     ── BuildEngine::export (docker buildx by default)
//! ```
//!
//! # Stages
//!
//! - **builder**: toolchain, lockfile-keyed install layer, full source, build tasks
//! - **deps**: production-only reinstall, pruned with `node-prune`
//! - **runtime**: pruned dependencies plus the app and its workspace packages

pub mod command;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod task;

pub use command::{CommandBuilder, ResolvedCommand};
pub use engine::{BuildEngine, BuildPlan, CopySource, CopySpec, DockerEngine, Operation, Stage};
pub use error::{CommandBuildError, EngineError, PipelineError};
pub use pipeline::{Phase, PipelineService, ProcessedSteps};
pub use task::{Task, TaskContext, TaskId, TaskRegistry};
