//! Deployment orchestration for deckhand.
//!
//! Drives each selected component through resolve, build, stage, patch and
//! deploy, one component at a time. Image builds fall back through an ordered
//! list of platform conventions.

pub mod error;
pub mod orchestrator;
pub mod strategy;

pub use error::{DeployError, DeployStage};
pub use orchestrator::{
    ComponentOutcome, ComponentState, DeployEvent, DeployOrchestrator, DeployPlan, DeploymentRun,
    Toolchain,
};
pub use strategy::{BuildStrategy, build_with_fallback};
