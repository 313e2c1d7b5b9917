mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shipyard", about = "Build container images from pnpm monorepos")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image for a service in shipyard.toml
    Build {
        /// Service name
        service: String,
        /// Override the configured image reference (placeholders allowed)
        #[arg(long)]
        image: Option<String>,
    },
    /// Print the Dockerfile a pipeline build would use, without building
    Plan {
        /// Service name
        service: String,
    },
    /// List workspace packages
    Packages {
        /// Repository root holding pnpm-workspace.yaml
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Only list the workspace dependencies of this package
        #[arg(long)]
        app: Option<String>,
    },
    /// Resolve placeholders such as {{ git.branch }} against the current repository
    Resolve {
        /// Text containing placeholders
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // arch-lint: allow(no-silent-result-drop) reason="an unset or malformed RUST_LOG falls back to info"
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // The command runs on its own task so Ctrl-C is seen even while a worker
    // sits in a blocking git lookup. Aborting drops the future, which kills
    // any build still running.
    let mut task = tokio::spawn(run(cli.command));
    tokio::select! {
        joined = &mut task => joined?,
        signal = tokio::signal::ctrl_c() => {
            task.abort();
            signal?;
            anyhow::bail!("interrupted, build cancelled")
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Build { service, image } => commands::build(&service, image.as_deref()).await?,
        Commands::Plan { service } => commands::plan(&service).await?,
        Commands::Packages { root, app } => commands::packages(&root, app.as_deref()).await?,
        Commands::Resolve { text } => commands::resolve(&text).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_runs_on_a_spawned_task() {
        let cli = Cli::parse_from(["shipyard", "resolve", "no placeholders"]);
        let result = tokio::spawn(run(cli.command)).await.unwrap();
        assert!(result.is_ok());
    }
}
