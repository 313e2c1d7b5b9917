use std::path::Path;

use shipyard_build::pipeline::CLOSURE_KINDS;
use shipyard_core::PnpmWorkspace;

pub async fn packages(root: &Path, app: Option<&str>) -> anyhow::Result<()> {
    let workspace = PnpmWorkspace::new(root);
    let all = workspace.workspace_packages()?;

    let selected = match app {
        Some(name) => {
            let package = all
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| anyhow::anyhow!("package '{name}' not found in workspace"))?;
            workspace.package_dependencies(package, &all, &CLOSURE_KINDS)
        }
        None => all,
    };

    if selected.is_empty() {
        println!("No packages found.");
        return Ok(());
    }
    for package in &selected {
        println!("{}\t{}", package.path, package.name());
    }
    Ok(())
}
