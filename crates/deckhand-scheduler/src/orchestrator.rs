//! Component orchestrator - deploys selected components one at a time.

use chrono::{DateTime, Utc};
use deckhand_config::{ConfigError, PatchCase, pin_image, resolve_image_name};
use deckhand_core::tooling::{
    ApplyOptions, ArtifactStager, ImageBuilder, ManifestApplier, ManifestRenderer,
};
use deckhand_core::{Component, ErrorCategory, ImageReference, Platform, RunId, TagResolver};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::{DeployError, DeployStage};
use crate::strategy::{BuildStrategy, build_with_fallback};

/// State of a component during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ComponentState {
    Pending,
    Resolving,
    Building,
    Staging,
    Patching,
    Deploying,
    Succeeded,
    Failed { stage: DeployStage, message: String },
}

impl ComponentState {
    pub fn is_success(&self) -> bool {
        matches!(self, ComponentState::Succeeded)
    }
}

impl From<DeployStage> for ComponentState {
    fn from(stage: DeployStage) -> Self {
        match stage {
            DeployStage::Resolving => ComponentState::Resolving,
            DeployStage::Building => ComponentState::Building,
            DeployStage::Staging => ComponentState::Staging,
            DeployStage::Patching => ComponentState::Patching,
            DeployStage::Deploying => ComponentState::Deploying,
        }
    }
}

/// Event emitted during a run.
#[derive(Debug, Clone)]
pub enum DeployEvent {
    RunStarted {
        run_id: RunId,
        platform: Platform,
        components: usize,
    },
    ComponentStarted {
        component: String,
    },
    StageStarted {
        component: String,
        stage: DeployStage,
    },
    ImageResolved {
        component: String,
        image: ImageReference,
    },
    ImageBuilt {
        component: String,
        strategy: BuildStrategy,
    },
    ImagePinned {
        component: String,
        case: PatchCase,
        changed: bool,
    },
    /// `state` is either `Succeeded` or `Failed`.
    ComponentCompleted {
        component: String,
        state: ComponentState,
    },
    RunCompleted {
        success: bool,
    },
}

/// What happened to one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentOutcome {
    pub component: Component,
    pub image: Option<ImageReference>,
    pub state: ComponentState,
    pub strategy: Option<BuildStrategy>,
    pub patch: Option<PatchCase>,
}

impl ComponentOutcome {
    fn pending(component: &Component) -> Self {
        Self {
            component: component.clone(),
            image: None,
            state: ComponentState::Pending,
            strategy: None,
            patch: None,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRun {
    pub id: RunId,
    pub platform: Platform,
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ComponentOutcome>,
    pub success: bool,
}

impl DeploymentRun {
    /// The component that aborted the run, if any.
    pub fn failure(&self) -> Option<&ComponentOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.state, ComponentState::Failed { .. }))
    }
}

/// What to deploy and where.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    /// Root of the checked-out source tree.
    pub repo: PathBuf,
    /// Components in deployment order.
    pub components: Vec<Component>,
    pub namespace: String,
}

/// External tools a run drives.
#[derive(Clone)]
pub struct Toolchain {
    pub builder: Arc<dyn ImageBuilder>,
    pub stager: Arc<dyn ArtifactStager>,
    pub renderer: Arc<dyn ManifestRenderer>,
    pub applier: Arc<dyn ManifestApplier>,
}

/// Orchestrates the deployment of a set of components.
pub struct DeployOrchestrator {
    tools: Toolchain,
    tags: Arc<TagResolver>,
    platform: Option<Platform>,
}

impl DeployOrchestrator {
    pub fn new(tools: Toolchain, tags: TagResolver) -> Self {
        Self {
            tools,
            tags: Arc::new(tags),
            platform: None,
        }
    }

    /// Build for `platform` instead of detecting the host's.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Execute a plan, returning a channel of events and a handle to get the final result.
    pub fn execute(
        &self,
        plan: DeployPlan,
    ) -> (
        mpsc::Receiver<DeployEvent>,
        tokio::task::JoinHandle<DeploymentRun>,
    ) {
        let (tx, rx) = mpsc::channel(100);
        let runner = Runner {
            tools: self.tools.clone(),
            tags: self.tags.clone(),
            platform: self.platform.unwrap_or_else(Platform::detect),
            repo: plan.repo,
            namespace: plan.namespace,
            tx,
        };
        let components = plan.components;

        let handle = tokio::spawn(async move { runner.run(components).await });

        (rx, handle)
    }
}

struct Runner {
    tools: Toolchain,
    tags: Arc<TagResolver>,
    platform: Platform,
    repo: PathBuf,
    namespace: String,
    tx: mpsc::Sender<DeployEvent>,
}

impl Runner {
    async fn run(&self, components: Vec<Component>) -> DeploymentRun {
        let id = RunId::new();
        let started_at = Utc::now();
        info!(run_id = %id, platform = %self.platform, components = components.len(), "Starting deployment");
        self.send(DeployEvent::RunStarted {
            run_id: id,
            platform: self.platform,
            components: components.len(),
        })
        .await;

        let mut outcomes: Vec<ComponentOutcome> =
            components.iter().map(ComponentOutcome::pending).collect();

        // Bad image names are input errors: reject them before anything is built.
        let mut names = Vec::with_capacity(components.len());
        for (idx, component) in components.iter().enumerate() {
            match resolve_image_name(&component.descriptor(&self.repo)) {
                Err(e) if e.category() == ErrorCategory::Input => {
                    let outcome = &mut outcomes[idx];
                    self.send(DeployEvent::ComponentStarted {
                        component: component.name().to_string(),
                    })
                    .await;
                    self.enter(outcome, DeployStage::Resolving).await;
                    self.fail(outcome, DeployError::config(DeployStage::Resolving, e))
                        .await;
                    return self.finish(id, started_at, outcomes).await;
                }
                result => names.push(result),
            }
        }

        // Every tag is resolved before the first document is patched.
        let mut tags = Vec::with_capacity(components.len());
        for component in &components {
            tags.push(self.tags.resolve(&component.source_dir(&self.repo)).await);
        }

        for ((outcome, name), tag) in outcomes.iter_mut().zip(names).zip(tags) {
            let component = outcome.component.name().to_string();
            self.send(DeployEvent::ComponentStarted {
                component: component.clone(),
            })
            .await;

            match self.deploy(outcome, name, tag).await {
                Ok(()) => {
                    info!(component = %component, "Component deployed successfully");
                    outcome.state = ComponentState::Succeeded;
                    self.send(DeployEvent::ComponentCompleted {
                        component,
                        state: ComponentState::Succeeded,
                    })
                    .await;
                }
                Err(e) => {
                    self.fail(outcome, e).await;
                    break;
                }
            }
        }

        self.finish(id, started_at, outcomes).await
    }

    async fn deploy(
        &self,
        outcome: &mut ComponentOutcome,
        name: Result<String, ConfigError>,
        tag: String,
    ) -> Result<(), DeployError> {
        let component = outcome.component.clone();
        let source_dir = component.source_dir(&self.repo);

        self.enter(outcome, DeployStage::Resolving).await;
        let name = name.map_err(|e| DeployError::config(DeployStage::Resolving, e))?;
        let image = ImageReference::new(name, tag)
            .map_err(|e| DeployError::core(DeployStage::Resolving, e))?;
        info!(component = component.name(), image = %image, "Resolved image");
        outcome.image = Some(image.clone());
        self.send(DeployEvent::ImageResolved {
            component: component.name().to_string(),
            image: image.clone(),
        })
        .await;

        self.enter(outcome, DeployStage::Building).await;
        let strategy =
            build_with_fallback(self.tools.builder.as_ref(), &source_dir, &image, self.platform)
                .await
                .map_err(|e| DeployError::core(DeployStage::Building, e))?;
        outcome.strategy = Some(strategy);
        self.send(DeployEvent::ImageBuilt {
            component: component.name().to_string(),
            strategy,
        })
        .await;

        self.enter(outcome, DeployStage::Staging).await;
        self.tools
            .stager
            .stage(&image)
            .await
            .map_err(|e| DeployError::core(DeployStage::Staging, e))?;

        self.enter(outcome, DeployStage::Patching).await;
        let patch = pin_image(&component.document(&self.repo), &image)
            .map_err(|e| DeployError::config(DeployStage::Patching, e))?;
        outcome.patch = Some(patch.case);
        self.send(DeployEvent::ImagePinned {
            component: component.name().to_string(),
            case: patch.case,
            changed: patch.changed,
        })
        .await;

        self.enter(outcome, DeployStage::Deploying).await;
        let manifests = self
            .tools
            .renderer
            .render(&component.overlay(&self.repo))
            .await
            .map_err(|e| DeployError::core(DeployStage::Deploying, e))?;
        let options = ApplyOptions {
            namespace: self.namespace.clone(),
        };
        self.tools
            .applier
            .apply(manifests, &options)
            .await
            .map_err(|e| DeployError::core(DeployStage::Deploying, e))?;

        Ok(())
    }

    async fn enter(&self, outcome: &mut ComponentOutcome, stage: DeployStage) {
        info!(component = outcome.component.name(), %stage, "Entering stage");
        outcome.state = stage.into();
        self.send(DeployEvent::StageStarted {
            component: outcome.component.name().to_string(),
            stage,
        })
        .await;
    }

    async fn fail(&self, outcome: &mut ComponentOutcome, err: DeployError) {
        error!(
            component = outcome.component.name(),
            stage = %err.stage(),
            category = ?err.category(),
            error = %err,
            "Component failed"
        );
        let state = ComponentState::Failed {
            stage: err.stage(),
            message: err.detail(),
        };
        outcome.state = state.clone();
        self.send(DeployEvent::ComponentCompleted {
            component: outcome.component.name().to_string(),
            state,
        })
        .await;
    }

    async fn finish(
        &self,
        id: RunId,
        started_at: DateTime<Utc>,
        outcomes: Vec<ComponentOutcome>,
    ) -> DeploymentRun {
        let success = outcomes.iter().all(|o| o.state.is_success());
        info!(run_id = %id, success, "Deployment finished");
        self.send(DeployEvent::RunCompleted { success }).await;

        DeploymentRun {
            id,
            platform: self.platform,
            namespace: self.namespace.clone(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
            success,
        }
    }

    async fn send(&self, event: DeployEvent) {
        let _ = self.tx.send(event).await;
    }
}
