//! Applies rendered manifests with kubectl.

use async_trait::async_trait;
use bytes::Bytes;
use deckhand_core::Result;
use deckhand_core::tooling::{ApplyOptions, ManifestApplier};
use std::time::Duration;
use tracing::info;

use crate::process::Tool;

/// Runs `kubectl apply --namespace <ns> -f -` with the manifests on stdin.
pub struct KubectlApplier {
    tool: Tool,
}

impl KubectlApplier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tool: Tool::from_env("DECKHAND_KUBECTL_BIN", "kubectl", timeout),
        }
    }

    pub fn with_tool(tool: Tool) -> Self {
        Self { tool }
    }

    fn args(options: &ApplyOptions) -> Vec<String> {
        vec![
            "apply".to_string(),
            "--namespace".to_string(),
            options.namespace.clone(),
            "-f".to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait]
impl ManifestApplier for KubectlApplier {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    async fn apply(&self, manifests: Bytes, options: &ApplyOptions) -> Result<()> {
        info!(namespace = %options.namespace, bytes = manifests.len(), "Applying manifests");
        let output = self
            .tool
            .run(&Self::args(options), None, Some(manifests))
            .await?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!("{}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::DEFAULT_TIMEOUT;

    #[test]
    fn test_apply_args() {
        let options = ApplyOptions {
            namespace: "deckhand-system".to_string(),
        };
        assert_eq!(
            KubectlApplier::args(&options),
            vec!["apply", "--namespace", "deckhand-system", "-f", "-"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_manifests_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("kubectl");
        std::fs::write(
            &script,
            format!("#!/bin/sh\ncat > {}/applied.yaml\n", dir.path().display()),
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let applier = KubectlApplier::with_tool(Tool::new(
            script.to_string_lossy().to_string(),
            DEFAULT_TIMEOUT,
        ));
        let manifests = Bytes::from_static(b"apiVersion: v1\nkind: Namespace\n");
        let options = ApplyOptions {
            namespace: "deckhand-system".to_string(),
        };
        applier.apply(manifests.clone(), &options).await.unwrap();

        let applied = std::fs::read(dir.path().join("applied.yaml")).unwrap();
        assert_eq!(applied, manifests.to_vec());
    }
}
