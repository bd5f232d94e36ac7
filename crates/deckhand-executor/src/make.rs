//! Make-based image builder.

use async_trait::async_trait;
use deckhand_core::Result;
use deckhand_core::tooling::{BuildRequest, ImageBuilder};
use std::time::Duration;
use tracing::info;

use crate::process::Tool;

/// Default make target that builds a component image.
pub const DEFAULT_BUILD_TARGET: &str = "docker-build";

/// Builds images with `make <target> IMG=<name>:<tag> [KEY=value...]`.
pub struct MakeBuilder {
    tool: Tool,
    target: String,
}

impl MakeBuilder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tool: Tool::from_env("DECKHAND_MAKE_BIN", "make", timeout),
            target: DEFAULT_BUILD_TARGET.to_string(),
        }
    }

    pub fn with_tool(tool: Tool, target: impl Into<String>) -> Self {
        Self {
            tool,
            target: target.into(),
        }
    }

    fn args(&self, request: &BuildRequest) -> Vec<String> {
        let mut args = vec![self.target.clone(), format!("IMG={}", request.image)];
        args.extend(
            request
                .variables
                .iter()
                .map(|(key, value)| format!("{}={}", key, value)),
        );
        args
    }
}

#[async_trait]
impl ImageBuilder for MakeBuilder {
    fn name(&self) -> &'static str {
        "make"
    }

    async fn build(&self, request: &BuildRequest) -> Result<()> {
        let args = self.args(request);
        info!(context = %request.context.display(), image = %request.image, ?args, "Building image");
        self.tool.run(&args, Some(&request.context), None).await?;
        Ok(())
    }
}
