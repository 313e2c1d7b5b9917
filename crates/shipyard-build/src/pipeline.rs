//! Monorepo image pipeline.
//!
//! [`PipelineService`] validates a [`PipelineConfig`], resolves the target
//! app and its workspace dependencies, expands the configured steps into
//! tasks and assembles a three-stage [`BuildPlan`]:
//!
//! 1. `builder` installs the toolchain, fetches dependencies from the
//!    lockfile alone, installs from manifests only, then copies the full
//!    source and runs every build task.
//! 2. `deps` reinstalls production dependencies only and prunes them.
//! 3. `runtime` receives the pruned dependencies plus the app, its workspace
//!    dependencies and the configured extra files.
//!
//! Everything up to the engine call is synchronous; a configuration error is
//! reported before the engine is touched.

use std::path::{Path, PathBuf};

use shipyard_core::workspace::{PACKAGE_MANIFEST, WORKSPACE_MANIFEST};
use shipyard_core::{
    DependencyKind, Package, PipelineConfig, Placeholders, Platform, PnpmWorkspace, ResolverTable,
    Step,
};

use crate::engine::{BuildEngine, BuildPlan, CopySpec, DockerEngine, STATE_DIR, Stage};
use crate::error::PipelineError;
use crate::task::{Command, TaskContext, TaskId, TaskRegistry, corepack_commands};

pub const BUILDER_STAGE: &str = "builder";
pub const DEPS_STAGE: &str = "deps";
pub const RUNTIME_STAGE: &str = "runtime";

const APP_DIR: &str = "/app";
const LOCKFILE: &str = "pnpm-lock.yaml";
const NPMRC: &str = ".npmrc";
const TSCONFIG: &str = "tsconfig.json";
const PNPM_HOME: &str = "/pnpm";
const PNPM_STORE: &str = "/pnpm/store";
const NODE_PRUNE_INSTALLER: &str = "https://gobinaries.com/tj/node-prune";
const NODE_PRUNE_SCRIPT: &str = "/tmp/install-node-prune.sh";

/// Build outputs and caches never copied from the host.
const VOLATILE_DIRS: [&str; 7] = [
    "**/node_modules",
    "**/dist",
    "**/build",
    "**/out",
    "**/.next",
    "**/.cache",
    "**/.turbo",
];

/// Dependency edges followed when collecting the app's workspace packages.
pub const CLOSURE_KINDS: [DependencyKind; 2] =
    [DependencyKind::Dependencies, DependencyKind::DevDependencies];

/// Which stage a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Runtime,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Runtime => "runtime",
        }
    }

    /// The runtime image only accepts bootstrap tasks.
    pub fn allows(self, id: TaskId) -> bool {
        match self {
            Self::Build => true,
            Self::Runtime => matches!(id, TaskId::SetupPnpm | TaskId::SetupBun),
        }
    }
}

/// What a list of steps contributes to its stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedSteps {
    pub system_packages: Vec<String>,
    pub post_install_commands: Vec<Command>,
    pub package_manager_packages: Vec<String>,
    pub commands: Vec<Command>,
}

/// The resolved pieces a plan is assembled from.
#[derive(Debug, Clone)]
struct Resolved {
    platform: Platform,
    app: Package,
    dependencies: Vec<Package>,
    cmd: Vec<String>,
    install_files: Vec<String>,
    include_paths: Vec<String>,
    build: ProcessedSteps,
    runtime: ProcessedSteps,
}

/// Builds one workspace app into a container image.
pub struct PipelineService<E: BuildEngine = DockerEngine> {
    config: PipelineConfig,
    workspace: PnpmWorkspace,
    placeholders: Placeholders,
    registry: TaskRegistry,
    engine: E,
}

impl PipelineService<DockerEngine> {
    pub fn new(config: PipelineConfig, repo_root: impl Into<PathBuf>, placeholders: Placeholders) -> Self {
        Self::with_engine(config, repo_root, placeholders, DockerEngine::new())
    }
}

impl<E: BuildEngine> PipelineService<E> {
    /// Create a service with a custom engine (for testing).
    pub fn with_engine(
        config: PipelineConfig,
        repo_root: impl Into<PathBuf>,
        placeholders: Placeholders,
        engine: E,
    ) -> Self {
        Self {
            config,
            workspace: PnpmWorkspace::new(repo_root),
            placeholders,
            registry: TaskRegistry::default(),
            engine,
        }
    }

    pub fn repo_root(&self) -> &Path {
        self.workspace.repo_root()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Builds the plan and exports its final stage as `output_image`.
    ///
    /// Dropping the returned future cancels the build in flight.
    pub async fn process_pipeline(&self, output_image: &str) -> Result<(), PipelineError> {
        let plan = self.plan()?;
        tracing::info!(
            app = %self.config.app,
            image = %output_image,
            platform = %plan.platform,
            "building pipeline image"
        );
        self.engine.export(&plan, output_image).await?;
        tracing::info!(image = %output_image, "pipeline image exported");
        Ok(())
    }

    /// Validates the configuration and assembles the three build stages.
    ///
    /// # Errors
    ///
    /// Configuration problems are [`ErrorKind::BadUserInput`](shipyard_core::ErrorKind::BadUserInput);
    /// filesystem and git failures are operational.
    pub fn plan(&self) -> Result<BuildPlan, PipelineError> {
        let resolved = self.resolve()?;
        let base_image = self.config.base_image();

        let stages = vec![
            self.builder_stage(&base_image, &resolved),
            self.deps_stage(&base_image, &resolved),
            runtime_stage(&base_image, &resolved),
        ];

        Ok(BuildPlan {
            platform: resolved.platform,
            context: self.repo_root().to_path_buf(),
            stages,
        })
    }

    /// Expands `steps` into tasks and collects what they contribute.
    pub fn process_steps(
        &self,
        steps: &[Step],
        resolvers: &ResolverTable,
        phase: Phase,
    ) -> Result<ProcessedSteps, PipelineError> {
        let ctx = TaskContext {
            placeholders: &self.placeholders,
            resolvers,
            repo_root: self.repo_root(),
            config: &self.config,
        };

        let mut processed = ProcessedSteps::default();
        for step in steps {
            let id: TaskId = step.task.parse()?;
            if !phase.allows(id) {
                return Err(PipelineError::TaskNotAllowed {
                    task: step.task.clone(),
                    phase: phase.as_str(),
                });
            }

            let task = self.registry.create(step, ctx)?;
            tracing::debug!(task = %id, phase = phase.as_str(), "processing step");

            extend_unique(&mut processed.system_packages, task.required_system_packages());
            processed
                .post_install_commands
                .extend(task.post_install_commands()?);
            extend_unique(
                &mut processed.package_manager_packages,
                task.required_package_manager_packages(),
            );
            processed.commands.extend(task.cmd()?);
        }
        Ok(processed)
    }

    fn resolve(&self) -> Result<Resolved, PipelineError> {
        let config = &self.config;
        if config.app.trim().is_empty() {
            return Err(PipelineError::MissingApp);
        }
        let platform_value = config.platform.as_deref().map_or("", str::trim);
        let platform = Platform::parse(platform_value).ok_or_else(|| {
            PipelineError::UnsupportedPlatform {
                platform: platform_value.to_owned(),
                supported: Platform::SUPPORTED
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;

        let packages = self.workspace.workspace_packages()?;
        let app = packages
            .iter()
            .find(|p| p.name() == config.app)
            .cloned()
            .ok_or_else(|| PipelineError::AppNotFound {
                app: config.app.clone(),
            })?;

        let dependencies = self
            .workspace
            .package_dependencies(&app, &packages, &CLOSURE_KINDS);
        tracing::info!(
            app = %app.name(),
            path = %app.path,
            dependencies = ?dependencies.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "resolved app package"
        );

        let resolvers = ResolverTable::new()
            .with_value("app.dir", app.path.clone())
            .with_value("app.package", app.name().to_owned());

        let cmd = self
            .placeholders
            .resolve_all(&config.cmd, &[&resolvers])
            .map_err(|e| PipelineError::Placeholder {
                what: "pipeline cmd".to_owned(),
                source: e,
            })?;
        if cmd.is_empty() {
            return Err(PipelineError::MissingCmd);
        }
        tracing::debug!(?cmd, "resolved entrypoint");

        let install_files = self.install_files(&app, &dependencies)?;
        let include_paths = self.include_paths(&app, &dependencies, &resolvers)?;

        let build = self.process_steps(&config.steps, &resolvers, Phase::Build)?;
        let runtime = self.process_steps(&config.runtime_steps, &resolvers, Phase::Runtime)?;
        if !runtime.package_manager_packages.is_empty() {
            return Err(PipelineError::RuntimePackageManagerPackages {
                packages: runtime.package_manager_packages,
            });
        }

        Ok(Resolved {
            platform,
            app,
            dependencies,
            cmd,
            install_files,
            include_paths,
            build,
            runtime,
        })
    }

    /// Files the manifest-only install layer needs, validated on the host.
    fn install_files(&self, app: &Package, dependencies: &[Package]) -> Result<Vec<String>, PipelineError> {
        let mut files = vec![
            app.manifest_path.clone(),
            PACKAGE_MANIFEST.to_owned(),
            LOCKFILE.to_owned(),
            WORKSPACE_MANIFEST.to_owned(),
            NPMRC.to_owned(),
            shipyard_core::walk::IGNORE_FILE.to_owned(),
        ];
        files.extend(dependencies.iter().map(|p| p.manifest_path.clone()));
        dedup_in_order(&mut files);

        for file in &files {
            let path = self.repo_root().join(file);
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    return Err(PipelineError::InstallPathIsDirectory { path: file.clone() });
                }
                Ok(_) => {}
                // arch-lint: allow(no-error-swallowing) reason="install files are optional; a missing one is copied as an optional glob"
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %file, "install file not present, skipping");
                }
                Err(e) => return Err(PipelineError::Stat { path, source: e }),
            }
        }
        Ok(files)
    }

    /// Paths copied from the builder into the runtime image.
    fn include_paths(
        &self,
        app: &Package,
        dependencies: &[Package],
        resolvers: &ResolverTable,
    ) -> Result<Vec<String>, PipelineError> {
        let mut paths: Vec<String> = dependencies.iter().map(|p| p.path.clone()).collect();
        paths.push(app.path.clone());
        paths.extend(
            [PACKAGE_MANIFEST, WORKSPACE_MANIFEST, LOCKFILE, TSCONFIG, NPMRC]
                .into_iter()
                .map(str::to_owned),
        );
        paths.push(shipyard_core::walk::IGNORE_FILE.to_owned());

        let extra = self
            .placeholders
            .resolve_all(&self.config.extra_files, &[resolvers])
            .map_err(|e| PipelineError::Placeholder {
                what: "extra_files".to_owned(),
                source: e,
            })?;
        paths.extend(extra);
        dedup_in_order(&mut paths);
        Ok(paths)
    }

    fn builder_stage(&self, base_image: &str, resolved: &Resolved) -> Stage {
        let config = &self.config;
        let build = &resolved.build;

        let mut stage = Stage::new(BUILDER_STAGE, base_image)
            .workdir(APP_DIR)
            .env("PNPM_HOME", PNPM_HOME)
            .env_expanded("PATH", "$PNPM_HOME:$PATH")
            .mount_cache(
                format!("pnpm-cache-{}", config.package_manager_version),
                PNPM_STORE,
            );

        if !build.system_packages.is_empty() {
            stage = stage.exec(apk_add(&build.system_packages));
        }
        stage = stage
            .exec_all(build.post_install_commands.iter().cloned())
            .exec_all(corepack_commands(&config.package_manager_version));
        if !build.package_manager_packages.is_empty() {
            let mut add = argv(&["pnpm", "add", "-g"]);
            add.extend(build.package_manager_packages.iter().cloned());
            stage = stage.exec(add);
        }

        let mut source_excludes: Vec<String> = VOLATILE_DIRS.iter().map(|d| (*d).to_owned()).collect();
        source_excludes.push(STATE_DIR.to_owned());
        source_excludes.extend(config.exclude_files.iter().cloned());

        stage
            .copy(CopySpec::host(APP_DIR).include([LOCKFILE]))
            .exec(argv(&["pnpm", "fetch"]))
            .copy(CopySpec::host(APP_DIR).include(resolved.install_files.iter().cloned()))
            .exec(argv(&["pnpm", "install", "--prefer-offline", "--frozen-lockfile"]))
            .copy(
                CopySpec::host(APP_DIR)
                    .exclude(source_excludes)
                    .with_gitignore(),
            )
            .exec_all(build.commands.iter().cloned())
    }

    fn deps_stage(&self, base_image: &str, resolved: &Resolved) -> Stage {
        let version = &self.config.package_manager_version;
        Stage::new(DEPS_STAGE, base_image)
            .workdir(APP_DIR)
            .exec(argv(&["apk", "add", "--no-cache", "curl"]))
            .exec(argv(&["curl", "-fsSL", NODE_PRUNE_INSTALLER, "-o", NODE_PRUNE_SCRIPT]))
            .exec(argv(&["sh", NODE_PRUNE_SCRIPT]))
            .exec_all(corepack_commands(version))
            .env("CI", "true")
            .copy(
                CopySpec::stage(BUILDER_STAGE, APP_DIR, APP_DIR)
                    .include(resolved.install_files.iter().cloned()),
            )
            .exec(argv(&[
                "pnpm",
                "install",
                "--prefer-offline",
                "--frozen-lockfile",
                "--prod",
            ]))
            .exec(argv(&["pnpm", "prune", "--prod", "--no-optional"]))
            .exec(argv(&["/usr/local/bin/node-prune", "/app/node_modules"]))
    }
}

fn runtime_stage(base_image: &str, resolved: &Resolved) -> Stage {
    let runtime = &resolved.runtime;
    let mut stage = Stage::new(RUNTIME_STAGE, base_image).workdir(APP_DIR);

    if !runtime.system_packages.is_empty() {
        stage = stage.exec(apk_add(&runtime.system_packages));
    }

    let mut package_modules: Vec<String> = resolved
        .dependencies
        .iter()
        .chain(std::iter::once(&resolved.app))
        .filter(|p| p.path != ".")
        .map(|p| p.join("node_modules"))
        .collect();
    dedup_in_order(&mut package_modules);

    let mut stage = stage
        .exec_all(runtime.post_install_commands.iter().cloned())
        .copy(CopySpec::stage(
            DEPS_STAGE,
            "/app/node_modules",
            "/app/node_modules",
        ));
    if !package_modules.is_empty() {
        stage = stage.copy(CopySpec::stage(DEPS_STAGE, APP_DIR, APP_DIR).include(package_modules));
    }

    stage
        .copy(
            CopySpec::stage(BUILDER_STAGE, APP_DIR, APP_DIR)
                .include(resolved.include_paths.iter().cloned())
                .exclude(["**/node_modules"]),
        )
        .exec_all(runtime.commands.iter().cloned())
        .entrypoint(resolved.cmd[..1].to_vec())
        .default_args(resolved.cmd[1..].to_vec())
}

fn apk_add(packages: &[String]) -> Command {
    let mut cmd = argv(&["apk", "add", "--no-cache"]);
    cmd.extend(packages.iter().cloned());
    cmd
}

fn argv(parts: &[&str]) -> Command {
    parts.iter().map(|p| (*p).to_owned()).collect()
}

fn extend_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_phase_allows_bootstrap_tasks_only() {
        assert!(Phase::Runtime.allows(TaskId::SetupPnpm));
        assert!(Phase::Runtime.allows(TaskId::SetupBun));
        assert!(!Phase::Runtime.allows(TaskId::Cli));
        assert!(!Phase::Runtime.allows(TaskId::GrpcGenerateTsProto));
        assert!(TaskId::ALL.into_iter().all(|id| Phase::Build.allows(id)));
    }

    #[test]
    fn extend_unique_keeps_first_occurrence() {
        let mut packages = vec!["curl".to_owned()];
        extend_unique(&mut packages, vec!["bash".to_owned(), "curl".to_owned()]);
        assert_eq!(packages, vec!["curl", "bash"]);
    }

    #[test]
    fn apk_add_lists_packages() {
        assert_eq!(
            apk_add(&["protobuf".to_owned()]),
            vec!["apk", "add", "--no-cache", "protobuf"]
        );
    }
}
