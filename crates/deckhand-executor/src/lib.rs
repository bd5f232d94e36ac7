//! External tool backends for deckhand.
//!
//! Provides process-backed implementations of the collaborator traits:
//! - git (tag description, repository cloning)
//! - make (component image builds)
//! - kind (staging images into a local cluster)
//! - kustomize (rendering overlays)
//! - kubectl (applying manifests)

pub mod git;
pub mod kind;
pub mod kubectl;
pub mod kustomize;
pub mod make;
pub mod process;

pub use git::GitCli;
pub use kind::KindStager;
pub use kubectl::KubectlApplier;
pub use kustomize::KustomizeRenderer;
pub use make::MakeBuilder;
pub use process::{DEFAULT_TIMEOUT, Tool, ToolOutput};

pub use deckhand_core::tooling::{
    ApplyOptions, ArtifactStager, BuildRequest, ImageBuilder, ManifestApplier, ManifestRenderer,
    VersionControl,
};
