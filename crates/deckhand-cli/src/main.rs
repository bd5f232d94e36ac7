//! deckhand CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(about = "Build platform components and deploy them to a local kind cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, stage, pin and apply the selected components
    Deploy(commands::deploy::DeployArgs),
    /// List the components deckhand knows how to deploy
    Components,
    /// Pin an image reference into a kustomization document
    Pin {
        /// Path to the kustomization.yaml to update
        document: PathBuf,
        /// Image reference as name:tag
        image: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries progress lines and summaries.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy(args) => {
            commands::deploy::run(args).await?;
        }
        Commands::Components => {
            commands::components::list();
        }
        Commands::Pin { document, image } => {
            commands::pin::pin(&document, &image)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_selection_flags() {
        let cli = Cli::try_parse_from(["deckhand", "deploy", "--apps", "--controllers", "tenant-controller"])
            .unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.apps.as_deref(), Some(""));
        assert_eq!(args.controllers.as_deref(), Some("tenant-controller"));
    }

    #[test]
    fn test_omitted_selection_is_none() {
        let cli = Cli::try_parse_from(["deckhand", "deploy", "--timeout", "90s"]).unwrap();
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.apps, None);
        assert_eq!(args.controllers, None);
        assert_eq!(args.timeout, Some(std::time::Duration::from_secs(90)));
    }

    #[test]
    fn test_pin_arguments() {
        let cli = Cli::try_parse_from(["deckhand", "pin", "kustomization.yaml", "registry/app:v1"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Pin { ref image, .. } if image == "registry/app:v1"));
    }
}
