use std::path::PathBuf;

use shipyard_core::ErrorKind;

/// Errors raised while validating a pipeline and assembling its build plan.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no app specified in pipeline config")]
    MissingApp,

    #[error("unsupported platform '{platform}' for pipeline builds; supported: {supported}")]
    UnsupportedPlatform { platform: String, supported: String },

    #[error("app package '{app}' not found in workspace packages")]
    AppNotFound { app: String },

    #[error("no 'cmd' specified for pipeline build")]
    MissingCmd,

    #[error("unsupported pipeline task '{task}'")]
    UnsupportedTask { task: String },

    #[error("pipeline task '{task}' is not allowed in the {phase} phase")]
    TaskNotAllowed { task: String, phase: &'static str },

    #[error("'{key}' option not specified for task {task}")]
    MissingOption { task: String, key: &'static str },

    #[error("'{key}' option for task {task} {reason}")]
    InvalidOption {
        task: String,
        key: &'static str,
        reason: String,
    },

    #[error("installing package-manager packages is not supported in the runtime phase: {}", packages.join(", "))]
    RuntimePackageManagerPackages { packages: Vec<String> },

    #[error("package installation path '{path}' is a directory, expected a file")]
    InstallPathIsDirectory { path: String },

    #[error("failed to stat package installation path {path}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to resolve placeholders in {what}")]
    Placeholder {
        what: String,
        source: shipyard_core::Error,
    },

    #[error(transparent)]
    Core(#[from] shipyard_core::Error),

    #[error("build engine failed")]
    Engine(#[from] EngineError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingApp
            | Self::UnsupportedPlatform { .. }
            | Self::AppNotFound { .. }
            | Self::MissingCmd
            | Self::UnsupportedTask { .. }
            | Self::TaskNotAllowed { .. }
            | Self::MissingOption { .. }
            | Self::InvalidOption { .. }
            | Self::RuntimePackageManagerPackages { .. }
            | Self::InstallPathIsDirectory { .. } => ErrorKind::BadUserInput,
            Self::Stat { .. } => ErrorKind::Operational,
            Self::Placeholder { source, .. } | Self::Core(source) => source.kind(),
            Self::Engine(source) => source.kind(),
        }
    }

    pub fn is_bad_user_input(&self) -> bool {
        self.kind() == ErrorKind::BadUserInput
    }
}

/// Errors from the external build engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write Dockerfile {path}")]
    WriteDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read ignore file {path}")]
    ReadIgnoreFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to execute {program}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("image build for {image} failed: {status}")]
    BuildFailed { image: String, status: String },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Operational
    }
}

/// Errors from the direct-command build strategy.
#[derive(Debug, thiserror::Error)]
pub enum CommandBuildError {
    #[error("build command is empty")]
    EmptyCommand,

    #[error("failed to resolve placeholders in {what}")]
    Placeholder {
        what: String,
        source: shipyard_core::Error,
    },

    #[error("failed to execute {program}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("build command {program} failed: {status}")]
    Failed { program: String, status: String },
}

impl CommandBuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCommand => ErrorKind::BadUserInput,
            Self::Placeholder { source, .. } => source.kind(),
            Self::Spawn { .. } | Self::Failed { .. } => ErrorKind::Operational,
        }
    }

    pub fn is_bad_user_input(&self) -> bool {
        self.kind() == ErrorKind::BadUserInput
    }
}
