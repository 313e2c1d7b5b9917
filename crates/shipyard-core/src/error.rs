use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification shared by every shipyard error type.
///
/// `BadUserInput` means the configuration (or the repository it points at) is
/// wrong and re-running without changing it fails the same way.
/// `Operational` covers I/O, subprocess, and engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadUserInput,
    Operational,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadUserInput => f.write_str("bad user input"),
            Self::Operational => f.write_str("operational failure"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "service '{service}' not found in config; configured services: {}",
        format_names(available)
    )]
    ServiceNotFound {
        service: String,
        available: Vec<String>,
    },

    // ── Workspace resolution ──
    #[error("workspace manifest not found at {path}")]
    WorkspaceManifestMissing { path: PathBuf },

    #[error("failed to read workspace manifest {path}")]
    WorkspaceManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse workspace manifest {path}")]
    WorkspaceManifestParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("no package patterns declared in {path}")]
    EmptyWorkspace { path: PathBuf },

    #[error("invalid glob pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to compile ignore rules from {path}")]
    Gitignore {
        path: PathBuf,
        source: ignore::Error,
    },

    #[error("failed to walk repository at {root}")]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },

    #[error("failed to read package manifest {path}")]
    PackageManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse package manifest {path}")]
    PackageManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    // ── Placeholders ──
    #[error("no resolver found for placeholder {placeholder}")]
    UnresolvedPlaceholder { placeholder: String },

    #[error("invalid modifier {modifier:?} in placeholder {placeholder}")]
    InvalidModifier {
        modifier: String,
        placeholder: String,
    },

    #[error("no resolver found for modifier '{modifier}' in placeholder {placeholder}")]
    UnknownModifier {
        modifier: String,
        placeholder: String,
    },

    #[error("{modifier} modifier expects {expected} argument(s), got {got}")]
    ModifierArity {
        modifier: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("resolving placeholder {placeholder}")]
    PlaceholderResolution {
        placeholder: String,
        source: Box<Error>,
    },

    // ── Git ──
    #[error("failed to execute git {command}")]
    GitSpawn {
        command: String,
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    GitFailed { command: String, stderr: String },

    #[error("HEAD is not pointing to a branch")]
    DetachedHead,

    #[error("no git tag found for current commit")]
    NoGitTag,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ServiceNotFound { .. }
            | Self::WorkspaceManifestMissing { .. }
            | Self::WorkspaceManifestParse { .. }
            | Self::EmptyWorkspace { .. }
            | Self::InvalidPattern { .. }
            | Self::PackageManifestParse { .. }
            | Self::ConfigParse { .. }
            | Self::UnresolvedPlaceholder { .. }
            | Self::InvalidModifier { .. }
            | Self::UnknownModifier { .. }
            | Self::ModifierArity { .. }
            | Self::NoGitTag => ErrorKind::BadUserInput,
            Self::PlaceholderResolution { source, .. } => source.kind(),
            Self::ConfigLoad { .. }
            | Self::WorkspaceManifestRead { .. }
            | Self::Gitignore { .. }
            | Self::Walk { .. }
            | Self::PackageManifestRead { .. }
            | Self::GitSpawn { .. }
            | Self::GitFailed { .. }
            | Self::DetachedHead => ErrorKind::Operational,
        }
    }

    pub fn is_bad_user_input(&self) -> bool {
        self.kind() == ErrorKind::BadUserInput
    }
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}
