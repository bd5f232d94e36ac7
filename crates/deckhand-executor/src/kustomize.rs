//! Renders kustomize overlays into manifest streams.

use async_trait::async_trait;
use bytes::Bytes;
use deckhand_core::tooling::ManifestRenderer;
use deckhand_core::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::process::Tool;

/// Runs `kustomize build <overlay>`, falling back to `kubectl kustomize`
/// when the standalone binary is not installed.
pub struct KustomizeRenderer {
    kustomize: Tool,
    kubectl: Tool,
}

impl KustomizeRenderer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            kustomize: Tool::from_env("DECKHAND_KUSTOMIZE_BIN", "kustomize", timeout),
            kubectl: Tool::from_env("DECKHAND_KUBECTL_BIN", "kubectl", timeout),
        }
    }

    pub fn with_tools(kustomize: Tool, kubectl: Tool) -> Self {
        Self { kustomize, kubectl }
    }
}

fn overlay_arg(overlay: &Path) -> String {
    overlay.to_string_lossy().to_string()
}

#[async_trait]
impl ManifestRenderer for KustomizeRenderer {
    fn name(&self) -> &'static str {
        "kustomize"
    }

    async fn render(&self, overlay: &Path) -> Result<Bytes> {
        info!(overlay = %overlay.display(), "Rendering manifests");
        let args = vec!["build".to_string(), overlay_arg(overlay)];
        match self.kustomize.run(&args, None, None).await {
            Ok(output) => Ok(output.stdout),
            Err(Error::ToolNotFound(program)) => {
                warn!(missing = %program, fallback = %self.kubectl.program(), "kustomize not found, using kubectl kustomize");
                let args = vec!["kustomize".to_string(), overlay_arg(overlay)];
                let output = self.kubectl.run(&args, None, None).await?;
                Ok(output.stdout)
            }
            Err(e) => Err(e),
        }
    }
}
