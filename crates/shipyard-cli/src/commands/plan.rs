use std::path::PathBuf;

use shipyard_build::PipelineService;
use shipyard_core::ShipyardConfig;

pub async fn plan(service: &str) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = ShipyardConfig::load(&project_dir)?;
    let pipeline = super::pipeline_config(&config, service)?;

    let repo_root = pipeline.repo_root(&project_dir);
    let placeholders = super::git_placeholders(&project_dir);
    let pipeline_service = PipelineService::new(pipeline.clone(), repo_root, placeholders);

    let plan = pipeline_service.plan()?;
    let dockerfile = pipeline_service.engine().render(&plan).await?;
    print!("{dockerfile}");
    Ok(())
}
