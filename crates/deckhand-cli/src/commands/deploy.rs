//! Component deployment command.

use anyhow::{Context, Result};
use clap::Args;
use deckhand_config::{RepositorySource, SETTINGS_FILE, Settings, load_settings};
use deckhand_core::{AppComponent, Component, ControllerComponent, TagResolver, select};
use deckhand_executor::kind::DEFAULT_CLUSTER;
use deckhand_executor::{
    DEFAULT_TIMEOUT, GitCli, KindStager, KubectlApplier, KustomizeRenderer, MakeBuilder,
};
use deckhand_scheduler::{
    ComponentState, DeployEvent, DeployOrchestrator, DeployPlan, DeploymentRun, Toolchain,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Namespace manifests are applied into when none is configured.
pub const DEFAULT_NAMESPACE: &str = "deckhand-system";

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Controllers to deploy, comma separated. Pass with no value to deploy none.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub controllers: Option<String>,

    /// Apps to deploy, comma separated. Pass with no value to deploy none.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub apps: Option<String>,

    /// Repository URL to clone, or path to an existing checkout
    #[arg(long, env = "DECKHAND_REPO")]
    pub repo: Option<String>,

    /// Namespace to apply manifests into
    #[arg(long, env = "DECKHAND_NAMESPACE")]
    pub namespace: Option<String>,

    /// Upper bound for each external tool invocation (e.g. 10m, 90s)
    #[arg(long, env = "DECKHAND_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// kind cluster to load images into
    #[arg(long, env = "DECKHAND_KIND_CLUSTER")]
    pub cluster: Option<String>,

    /// Tag every image with this instead of the git description
    #[arg(long, env = "DECKHAND_IMAGE_TAG")]
    pub tag: Option<String>,

    /// Print the run summary as JSON instead of progress lines
    #[arg(long)]
    pub json: bool,

    /// Settings file (defaults to ./deckhand.kdl when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Deploy settings after merging flags, environment, settings file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeployConfig {
    repository: RepositorySource,
    namespace: String,
    timeout: Duration,
    cluster: String,
    tag: Option<String>,
    controllers: Option<String>,
    apps: Option<String>,
}

impl DeployConfig {
    /// Flags and environment (already merged by clap) win over the file.
    fn merge(args: &DeployArgs, file: Settings) -> Self {
        let repository = args.repo.clone().or(file.repository);
        Self {
            repository: RepositorySource::parse(repository.as_deref()),
            namespace: args
                .namespace
                .clone()
                .or(file.namespace)
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            timeout: args.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT),
            cluster: args
                .cluster
                .clone()
                .or(file.cluster)
                .unwrap_or_else(|| DEFAULT_CLUSTER.to_string()),
            tag: args.tag.clone().or(file.tag),
            controllers: args.controllers.clone().or(file.controllers),
            apps: args.apps.clone().or(file.apps),
        }
    }
}

fn read_settings(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => load_settings(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?
            .with_context(|| format!("Settings file not found: {}", path.display())),
        None => {
            let path = Path::new(SETTINGS_FILE);
            let settings = load_settings(path)
                .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
            Ok(settings.unwrap_or_default())
        }
    }
}

fn selected_components(config: &DeployConfig) -> Result<Vec<Component>> {
    let controllers = select::<ControllerComponent>(config.controllers.as_deref())
        .context("Invalid --controllers selection")?;
    let apps = select::<AppComponent>(config.apps.as_deref()).context("Invalid --apps selection")?;

    Ok(controllers
        .into_iter()
        .map(Component::from)
        .chain(apps.into_iter().map(Component::from))
        .collect())
}

/// Directory a remote repository is cloned into.
fn clone_dir(url: &str) -> PathBuf {
    let base = std::env::var_os("DECKHAND_WORK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("deckhand-repos"));
    base.join(format!("{:x}", md5::compute(url.as_bytes())))
}

async fn acquire_repository(source: &RepositorySource, git: &GitCli) -> Result<PathBuf> {
    match source {
        RepositorySource::Local(path) => {
            if !path.is_dir() {
                anyhow::bail!("Repository path does not exist: {}", path.display());
            }
            path.canonicalize()
                .with_context(|| format!("Failed to resolve repository path: {}", path.display()))
        }
        RepositorySource::Remote(url) => {
            let dest = clone_dir(url);
            if dest.exists() {
                info!(path = %dest.display(), "Removing previous clone");
                std::fs::remove_dir_all(&dest)
                    .with_context(|| format!("Failed to remove {}", dest.display()))?;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            git.clone_repository(url, &dest)
                .await
                .with_context(|| format!("Failed to clone {}", url))?;
            Ok(dest)
        }
    }
}

/// Deploy the selected components.
pub async fn run(args: DeployArgs) -> Result<()> {
    let settings = read_settings(args.config.as_deref())?;
    let config = DeployConfig::merge(&args, settings);

    // Input errors surface here, before anything is cloned, built or written.
    let components = selected_components(&config)?;
    let git = Arc::new(GitCli::new(config.timeout));
    let tags = match &config.tag {
        Some(tag) => TagResolver::with_override(git.clone(), tag.clone())
            .context("Invalid --tag override")?,
        None => TagResolver::new(git.clone()),
    };

    info!(source = %config.repository, "Acquiring repository");
    let repo = acquire_repository(&config.repository, &git).await?;
    info!(repo = %repo.display(), namespace = %config.namespace, cluster = %config.cluster, "Using repository");

    let tools = Toolchain {
        builder: Arc::new(MakeBuilder::new(config.timeout)),
        stager: Arc::new(KindStager::new(config.cluster.clone(), config.timeout)),
        renderer: Arc::new(KustomizeRenderer::new(config.timeout)),
        applier: Arc::new(KubectlApplier::new(config.timeout)),
    };
    let orchestrator = DeployOrchestrator::new(tools, tags);

    let (mut rx, result_handle) = orchestrator.execute(DeployPlan {
        repo,
        components,
        namespace: config.namespace.clone(),
    });

    // Process events concurrently with execution
    while let Some(event) = rx.recv().await {
        if !args.json {
            print_event(&event);
        }
    }

    let result = result_handle.await.context("Deployment task failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    match result.failure() {
        None => Ok(()),
        Some(outcome) => match &outcome.state {
            ComponentState::Failed { stage, message } => anyhow::bail!(
                "{} failed during {}: {}",
                outcome.component.name(),
                stage,
                message
            ),
            _ => anyhow::bail!("{} failed", outcome.component.name()),
        },
    }
}

fn print_event(event: &DeployEvent) {
    match event {
        DeployEvent::RunStarted {
            run_id,
            platform,
            components,
        } => {
            println!(
                "--- Deploying {} component(s) for {} (run {}) ---\n",
                components,
                platform,
                run_id.short()
            );
        }
        DeployEvent::ComponentStarted { component } => {
            println!("▶ {}", component);
        }
        DeployEvent::StageStarted { component, stage } => {
            println!("  [{}] {}", component, stage);
        }
        DeployEvent::ImageResolved { component, image } => {
            println!("  [{}] image {}", component, image);
        }
        DeployEvent::ImageBuilt {
            component,
            strategy,
        } => {
            println!("  [{}] built using the {} strategy", component, strategy);
        }
        DeployEvent::ImagePinned {
            component, changed, ..
        } => {
            if *changed {
                println!("  [{}] image pin updated", component);
            } else {
                println!("  [{}] image pin already current", component);
            }
        }
        DeployEvent::ComponentCompleted { component, state } => match state {
            ComponentState::Failed { stage, message } => {
                println!("✗ {} failed during {}: {}\n", component, stage, message);
            }
            _ => println!("✓ {} deployed\n", component),
        },
        DeployEvent::RunCompleted { success } => {
            if *success {
                println!("--- Deployment completed successfully ---");
            } else {
                println!("--- Deployment failed ---");
            }
        }
    }
}

fn print_summary(result: &DeploymentRun) {
    println!("\n--- Component Summary ---");
    for outcome in &result.outcomes {
        let status = match &outcome.state {
            ComponentState::Succeeded => "✓ succeeded".to_string(),
            ComponentState::Failed { stage, message } => {
                format!("✗ failed during {}: {}", stage, message)
            }
            ComponentState::Pending => "○ not attempted".to_string(),
            other => format!("▶ {:?}", other),
        };
        match &outcome.image {
            Some(image) => println!("  {} ({}) - {}", outcome.component.name(), image, status),
            None => println!("  {} - {}", outcome.component.name(), status),
        }
    }
}
