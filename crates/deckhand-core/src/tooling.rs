//! Collaborator traits for the external tools a deployment drives.
//!
//! Each trait is a single opaque operation that succeeds or fails. Process
//! backed implementations live in `deckhand-executor`; tests supply mocks.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::{ImageReference, Result};

/// One invocation of a component build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Directory the build runs in.
    pub context: PathBuf,
    /// Reference the produced image must be tagged with.
    pub image: ImageReference,
    /// Extra `KEY=value` variables passed to the build.
    pub variables: Vec<(String, String)>,
}

/// Options for applying a rendered manifest stream.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Namespace objects without an explicit namespace are applied into.
    pub namespace: String,
}

/// Version-control metadata lookup.
#[async_trait]
pub trait VersionControl: Send + Sync {
    fn name(&self) -> &'static str;

    /// Descriptive tag for the tree at `path`, or `None` if there is none.
    async fn describe(&self, path: &Path) -> Option<String>;
}

/// Builds a container image into the local image store.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run a build. On success an image tagged `request.image` exists locally.
    async fn build(&self, request: &BuildRequest) -> Result<()>;
}

/// Makes a locally built image available to the target runtime.
#[async_trait]
pub trait ArtifactStager: Send + Sync {
    fn name(&self) -> &'static str;

    async fn stage(&self, image: &ImageReference) -> Result<()>;
}

/// Expands a kustomize tree into a flat manifest stream.
#[async_trait]
pub trait ManifestRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, overlay: &Path) -> Result<Bytes>;
}

/// Applies a manifest stream to the cluster.
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, manifests: Bytes, options: &ApplyOptions) -> Result<()>;
}
