mod build;
mod packages;
mod plan;
mod resolve;

use std::path::Path;
use std::sync::Arc;

use shipyard_core::{GitCli, PipelineConfig, Placeholders, ShipyardConfig};

pub use build::build;
pub use packages::packages;
pub use plan::plan;
pub use resolve::resolve;

/// Placeholders backed by the git repository containing `dir`.
pub(crate) fn git_placeholders(dir: &Path) -> Placeholders {
    Placeholders::new(Arc::new(GitCli::new(dir)))
}

/// The pipeline definition of `service`, or an error naming the service.
pub(crate) fn pipeline_config<'a>(
    config: &'a ShipyardConfig,
    service: &str,
) -> anyhow::Result<&'a PipelineConfig> {
    config
        .service(service)?
        .build
        .as_ref()
        .and_then(|build| build.pipeline.as_ref())
        .ok_or_else(|| anyhow::anyhow!("service '{service}' has no [build.pipeline] section"))
}
