//! Ordered build strategies.
//!
//! Component Makefiles disagree on how a target platform is passed in, so a
//! build is attempted with progressively less specific conventions until one
//! succeeds.

use deckhand_core::tooling::{BuildRequest, ImageBuilder};
use deckhand_core::{Error, ImageReference, Platform, Result};
use derive_more::Display;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// One platform-passing convention for a build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// `ARCH=<arch>`
    #[display("architecture")]
    Architecture,
    /// `PLATFORM=<os>/<arch>`
    #[display("platform")]
    Platform,
    /// `BUILD_ARGS=--platform=<os>/<arch>`
    #[display("build-args")]
    BuildArgs,
    /// No platform variables; the build's own default applies.
    #[display("default")]
    Default,
}

impl BuildStrategy {
    /// Strategies in the order they are attempted.
    pub const ORDER: [BuildStrategy; 4] = [
        BuildStrategy::Architecture,
        BuildStrategy::Platform,
        BuildStrategy::BuildArgs,
        BuildStrategy::Default,
    ];

    /// Build variables this strategy passes for `platform`.
    pub fn variables(&self, platform: Platform) -> Vec<(String, String)> {
        match self {
            BuildStrategy::Architecture => vec![("ARCH".to_string(), platform.arch().to_string())],
            BuildStrategy::Platform => vec![("PLATFORM".to_string(), platform.to_string())],
            BuildStrategy::BuildArgs => vec![(
                "BUILD_ARGS".to_string(),
                format!("--platform={}", platform),
            )],
            BuildStrategy::Default => Vec::new(),
        }
    }
}

/// Build `image` from `context`, trying each strategy in [`BuildStrategy::ORDER`].
///
/// Returns the strategy that succeeded. Individual failures are logged and
/// swallowed; only when every strategy fails is [`Error::BuildFailed`]
/// returned, listing each attempt.
pub async fn build_with_fallback(
    builder: &dyn ImageBuilder,
    context: &Path,
    image: &ImageReference,
    platform: Platform,
) -> Result<BuildStrategy> {
    let mut attempts = Vec::new();

    for strategy in BuildStrategy::ORDER {
        let request = BuildRequest {
            context: context.to_path_buf(),
            image: image.clone(),
            variables: strategy.variables(platform),
        };

        match builder.build(&request).await {
            Ok(()) => {
                info!(image = %image, %strategy, builder = builder.name(), "Image built");
                return Ok(strategy);
            }
            Err(e) => {
                warn!(image = %image, %strategy, error = %e, "Build attempt failed, trying next strategy");
                attempts.push(format!("{}: {}", strategy, e));
            }
        }
    }

    Err(Error::BuildFailed {
        image: image.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails the first `failures` builds, recording every request.
    struct FlakyBuilder {
        failures: usize,
        requests: Mutex<Vec<BuildRequest>>,
    }

    impl FlakyBuilder {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn variables(&self) -> Vec<Vec<(String, String)>> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.variables.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ImageBuilder for FlakyBuilder {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn build(&self, request: &BuildRequest) -> Result<()> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            if requests.len() <= self.failures {
                return Err(Error::ToolFailed {
                    tool: "make".to_string(),
                    message: "exit 2: unknown variable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn image() -> ImageReference {
        ImageReference::new("registry/app", "v1").unwrap()
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn test_strategy_variables() {
        let platform = Platform::LinuxArm64;
        assert_eq!(
            BuildStrategy::Architecture.variables(platform),
            vec![pair("ARCH", "arm64")]
        );
        assert_eq!(
            BuildStrategy::Platform.variables(platform),
            vec![pair("PLATFORM", "linux/arm64")]
        );
        assert_eq!(
            BuildStrategy::BuildArgs.variables(platform),
            vec![pair("BUILD_ARGS", "--platform=linux/arm64")]
        );
        assert!(BuildStrategy::Default.variables(platform).is_empty());
    }

    #[tokio::test]
    async fn test_first_strategy_wins() {
        let builder = FlakyBuilder::new(0);
        let strategy = build_with_fallback(&builder, Path::new("/src/app"), &image(), Platform::LinuxAmd64)
            .await
            .unwrap();
        assert_eq!(strategy, BuildStrategy::Architecture);
        assert_eq!(builder.variables().len(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let builder = FlakyBuilder::new(2);
        let strategy = build_with_fallback(&builder, Path::new("/src/app"), &image(), Platform::LinuxAmd64)
            .await
            .unwrap();

        assert_eq!(strategy, BuildStrategy::BuildArgs);
        // the default strategy is never attempted
        assert_eq!(
            builder.variables(),
            vec![
                vec![pair("ARCH", "amd64")],
                vec![pair("PLATFORM", "linux/amd64")],
                vec![pair("BUILD_ARGS", "--platform=linux/amd64")],
            ]
        );
        let requests = builder.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.image == image()));
        assert!(requests.iter().all(|r| r.context == Path::new("/src/app")));
    }

    #[tokio::test]
    async fn test_exhaustion_lists_every_attempt() {
        let builder = FlakyBuilder::new(4);
        let err = build_with_fallback(&builder, Path::new("/src/app"), &image(), Platform::LinuxAmd64)
            .await
            .unwrap_err();

        match err {
            Error::BuildFailed { image, attempts } => {
                assert_eq!(image, "registry/app:v1");
                assert_eq!(attempts.len(), 4);
                assert!(attempts[0].starts_with("architecture: make failed"));
                assert!(attempts[3].starts_with("default: "));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(builder.variables().len(), 4);
    }
}
