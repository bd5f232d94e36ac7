//! Git command-line backend.

use async_trait::async_trait;
use deckhand_core::Result;
use deckhand_core::tooling::VersionControl;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::process::Tool;

/// Runs the `git` binary (or `DECKHAND_GIT_BIN`).
pub struct GitCli {
    tool: Tool,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tool: Tool::from_env("DECKHAND_GIT_BIN", "git", timeout),
        }
    }

    pub fn with_tool(tool: Tool) -> Self {
        Self { tool }
    }

    /// Clone the default branch of `url` into `dest`, which must not exist yet.
    ///
    /// History is fetched in full so `describe` can reach the nearest tag.
    pub async fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        info!(url = %url, path = %dest.display(), "Cloning repository");
        let args = vec![
            "clone".to_string(),
            "--single-branch".to_string(),
            url.to_string(),
            dest.to_string_lossy().to_string(),
        ];
        self.tool.run(&args, None, None).await?;
        info!(path = %dest.display(), "Repository cloned successfully");
        Ok(())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn describe(&self, path: &Path) -> Option<String> {
        let args = ["describe", "--tags", "--dirty"].map(String::from);
        match self.tool.run(&args, Some(path), None).await {
            Ok(output) => {
                let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!described.is_empty()).then_some(described)
            }
            Err(e) => {
                debug!(dir = %path.display(), error = %e, "git describe unavailable");
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::DEFAULT_TIMEOUT;

    #[tokio::test]
    async fn test_describe_outside_repository() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(DEFAULT_TIMEOUT);
        assert_eq!(git.describe(dir.path()).await, None);
    }

    #[tokio::test]
    async fn test_describe_reads_stdout() {
        let git = GitCli::with_tool(Tool::new("echo", DEFAULT_TIMEOUT));
        let dir = tempfile::tempdir().unwrap();
        // echo prints its arguments back, standing in for git's output
        assert_eq!(
            git.describe(dir.path()).await.as_deref(),
            Some("describe --tags --dirty")
        );
    }

    fn git(dir: &Path, args: &[&str]) -> bool {
        std::process::Command::new("git")
            .args([
                "-c",
                "user.name=deckhand",
                "-c",
                "user.email=deckhand@example.com",
                "-c",
                "commit.gpgsign=false",
                "-c",
                "tag.gpgsign=false",
            ])
            .args(args)
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_clone_keeps_history_back_to_tag() {
        let source = tempfile::tempdir().unwrap();
        if !git(source.path(), &["init", "--quiet"]) {
            // git is not installed
            return;
        }
        std::fs::write(source.path().join("Makefile"), "IMG ?= controller\n").unwrap();
        assert!(git(source.path(), &["add", "."]));
        assert!(git(source.path(), &["commit", "--quiet", "-m", "initial"]));
        assert!(git(source.path(), &["tag", "v1.0.0"]));
        std::fs::write(source.path().join("README"), "controller\n").unwrap();
        assert!(git(source.path(), &["add", "."]));
        assert!(git(source.path(), &["commit", "--quiet", "-m", "docs"]));

        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("checkout");
        let url = format!("file://{}", source.path().display());
        let git_cli = GitCli::new(DEFAULT_TIMEOUT);
        git_cli.clone_repository(&url, &dest).await.unwrap();

        let described = git_cli.describe(&dest).await.unwrap();
        assert!(described.starts_with("v1.0.0-1-g"), "described as {described}");
        assert!(!described.ends_with("-dirty"));
    }

    #[tokio::test]
    async fn test_missing_binary_degrades() {
        let git = GitCli::with_tool(Tool::new("deckhand-no-such-git", DEFAULT_TIMEOUT));
        assert_eq!(git.describe(Path::new(".")).await, None);
    }
}
