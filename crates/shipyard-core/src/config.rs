use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "shipyard.toml";

/// shipyard.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipyardConfig {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Output image reference; placeholders are resolved before use.
    #[serde(default)]
    pub image: String,
    /// How the image is built. `None` means the service ships a prebuilt image.
    #[serde(default)]
    pub build: Option<BuildConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Direct build command. A single element is run through `sh -c`.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Extra environment for the direct build command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory for the direct build command.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Monorepo pipeline definition.
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
}

/// The build strategy selected by a [`BuildConfig`].
#[derive(Debug, Clone, Copy)]
pub enum BuildStrategy<'a> {
    Command(&'a BuildConfig),
    Pipeline(&'a PipelineConfig),
}

impl BuildConfig {
    /// A non-empty `cmd` wins over a pipeline definition.
    pub fn strategy(&self) -> Option<BuildStrategy<'_>> {
        if !self.cmd.is_empty() {
            return Some(BuildStrategy::Command(self));
        }
        self.pipeline.as_ref().map(BuildStrategy::Pipeline)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Node.js version used for the `node:<version>-alpine` base image
    #[serde(default = "default_runtime_version")]
    pub runtime_version: String,
    /// pnpm version activated through corepack
    #[serde(default = "default_package_manager_version")]
    pub package_manager_version: String,
    /// Base image override for all stages
    #[serde(default)]
    pub base_image: Option<String>,
    /// Manifest name of the workspace package to build
    #[serde(default)]
    pub app: String,
    /// Repository root, relative to the config file directory
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Extra paths copied into the runtime image
    #[serde(default)]
    pub extra_files: Vec<String>,
    /// Extra patterns excluded from the full-source copy
    #[serde(default)]
    pub exclude_files: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub runtime_steps: Vec<Step>,
    /// Target platform, e.g. `linux/arm64`. Empty means `linux/amd64`.
    #[serde(default)]
    pub platform: Option<String>,
    /// Entrypoint followed by its default arguments
    #[serde(default)]
    pub cmd: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            runtime_version: default_runtime_version(),
            package_manager_version: default_package_manager_version(),
            base_image: None,
            app: String::new(),
            root: default_root(),
            extra_files: Vec::new(),
            exclude_files: Vec::new(),
            steps: Vec::new(),
            runtime_steps: Vec::new(),
            platform: None,
            cmd: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Repository root resolved against the directory holding the config file.
    pub fn repo_root(&self, config_dir: &Path) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            config_dir.join(&self.root)
        }
    }

    pub fn base_image(&self) -> String {
        match &self.base_image {
            Some(image) => image.clone(),
            None => format!("node:{}-alpine", self.runtime_version),
        }
    }
}

/// One configured unit of pipeline work.
///
/// Everything besides `task` and `working_directory` lands in `extra` and is
/// validated by the task that reads it, when its commands are requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub task: String,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Step {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_option(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_owned(), value);
        self
    }
}

/// Platforms accepted for pipeline builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinuxAmd64,
    LinuxArm64,
}

impl Platform {
    pub const SUPPORTED: [Platform; 2] = [Platform::LinuxAmd64, Platform::LinuxArm64];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxAmd64 => "linux/amd64",
            Self::LinuxArm64 => "linux/arm64",
        }
    }

    /// Parses a configured platform. An empty value selects `linux/amd64`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Some(Self::LinuxAmd64);
        }
        Self::SUPPORTED.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ShipyardConfig {
    /// Load from shipyard.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            tracing::debug!(path = %config_path.display(), "loaded config");
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }

    pub fn service(&self, name: &str) -> crate::Result<&ServiceConfig> {
        self.services
            .get(name)
            .ok_or_else(|| crate::Error::ServiceNotFound {
                service: name.to_owned(),
                available: self.services.keys().cloned().collect(),
            })
    }
}

fn default_runtime_version() -> String {
    "22".to_owned()
}

fn default_package_manager_version() -> String {
    "9".to_owned()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
