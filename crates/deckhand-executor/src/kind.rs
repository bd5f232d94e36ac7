//! Stages built images into a local kind cluster.

use async_trait::async_trait;
use deckhand_core::tooling::ArtifactStager;
use deckhand_core::{ImageReference, Result};
use std::time::Duration;
use tracing::info;

use crate::process::Tool;

/// Default kind cluster name.
pub const DEFAULT_CLUSTER: &str = "kind";

/// Runs `kind load docker-image <image> --name <cluster>`.
pub struct KindStager {
    tool: Tool,
    cluster: String,
}

impl KindStager {
    pub fn new(cluster: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool: Tool::from_env("DECKHAND_KIND_BIN", "kind", timeout),
            cluster: cluster.into(),
        }
    }

    pub fn with_tool(tool: Tool, cluster: impl Into<String>) -> Self {
        Self {
            tool,
            cluster: cluster.into(),
        }
    }

    fn args(&self, image: &ImageReference) -> Vec<String> {
        vec![
            "load".to_string(),
            "docker-image".to_string(),
            image.to_string(),
            "--name".to_string(),
            self.cluster.clone(),
        ]
    }
}

#[async_trait]
impl ArtifactStager for KindStager {
    fn name(&self) -> &'static str {
        "kind"
    }

    async fn stage(&self, image: &ImageReference) -> Result<()> {
        info!(image = %image, cluster = %self.cluster, "Loading image into cluster");
        self.tool.run(&self.args(image), None, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::DEFAULT_TIMEOUT;

    #[test]
    fn test_load_args() {
        let stager = KindStager::new("dev", DEFAULT_TIMEOUT);
        let image = ImageReference::new("controller", "v0.3.0-2-gabc1234").unwrap();
        assert_eq!(
            stager.args(&image),
            vec!["load", "docker-image", "controller:v0.3.0-2-gabc1234", "--name", "dev"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_is_reported() {
        let stager = KindStager::with_tool(Tool::new("false", DEFAULT_TIMEOUT), DEFAULT_CLUSTER);
        let image = ImageReference::new("controller", "latest").unwrap();
        let err = stager.stage(&image).await.unwrap_err();
        assert!(matches!(err, deckhand_core::Error::ToolFailed { .. }));
    }
}
