use std::path::PathBuf;

use shipyard_build::{CommandBuilder, PipelineService};
use shipyard_core::{BuildStrategy, ShipyardConfig};

pub async fn build(service: &str, image: Option<&str>) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = ShipyardConfig::load(&project_dir)?;
    let service_config = config.service(service)?;
    let placeholders = super::git_placeholders(&project_dir);

    let strategy = service_config
        .build
        .as_ref()
        .and_then(|build| build.strategy())
        .ok_or_else(|| anyhow::anyhow!("service '{service}' has no build cmd or pipeline"))?;

    match strategy {
        BuildStrategy::Command(build) => {
            tracing::debug!(%service, "building with direct command");
            CommandBuilder::new(build, &project_dir, &placeholders)
                .run()
                .await?;
            println!("Built service {service}");
        }
        BuildStrategy::Pipeline(pipeline) => {
            let template = match image {
                Some(image) => image,
                None => service_config.image.as_str(),
            };
            if template.trim().is_empty() {
                anyhow::bail!("no image configured for service '{service}'; set image or pass --image");
            }
            let image = placeholders.resolve(template, &[])?;

            let repo_root = pipeline.repo_root(&project_dir);
            tracing::debug!(%service, root = %repo_root.display(), "building with pipeline");
            PipelineService::new(pipeline.clone(), repo_root, placeholders)
                .process_pipeline(&image)
                .await?;
            println!("Built image {image}");
        }
    }

    Ok(())
}
