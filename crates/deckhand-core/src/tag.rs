//! Deployment tag resolution.
//!
//! A missing tag must never block a deployment, so resolution degrades to
//! [`FALLBACK_TAG`] instead of failing. An explicit override is the one input
//! that is validated, because it comes from the user.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::image::{MAX_TAG_LEN, is_valid_tag};
use crate::tooling::VersionControl;
use crate::{Error, Result};

/// Tag used when no version-control tag can be determined.
pub const FALLBACK_TAG: &str = "latest";

/// Computes the tag a component's image is built and pinned with.
pub struct TagResolver {
    vcs: Arc<dyn VersionControl>,
    override_tag: Option<String>,
}

impl TagResolver {
    pub fn new(vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            vcs,
            override_tag: None,
        }
    }

    /// Use a fixed tag for every component instead of asking version control.
    pub fn with_override(vcs: Arc<dyn VersionControl>, tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if !is_valid_tag(&tag) {
            return Err(Error::InvalidImageReference(format!(
                "tag override '{}' must match [A-Za-z0-9._-]{{1,{}}}",
                tag, MAX_TAG_LEN
            )));
        }
        Ok(Self {
            vcs,
            override_tag: Some(tag),
        })
    }

    /// Resolve the tag for the source tree at `source_dir`.
    pub async fn resolve(&self, source_dir: &Path) -> String {
        if let Some(tag) = &self.override_tag {
            return tag.clone();
        }

        let dir = match source_dir.canonicalize() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(dir = %source_dir.display(), error = %e, "Cannot resolve source directory, using fallback tag");
                return FALLBACK_TAG.to_string();
            }
        };

        let Some(described) = self.vcs.describe(&dir).await else {
            debug!(dir = %dir.display(), vcs = self.vcs.name(), "No descriptive tag, using fallback tag");
            return FALLBACK_TAG.to_string();
        };

        match sanitize_tag(&described) {
            Some(tag) => {
                if tag != described {
                    warn!(described = %described, tag = %tag, "Sanitized version-control tag");
                }
                tag
            }
            None => FALLBACK_TAG.to_string(),
        }
    }
}

/// Coerce a version-control description into the tag grammar.
///
/// Disallowed characters become `-` and the result is cut to the maximum tag
/// length. Returns `None` if nothing usable is left.
pub fn sanitize_tag(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_TAG_LEN)
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '-') {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FixedDescribe {
        result: Option<String>,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FixedDescribe {
        fn new(result: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                result: result.map(String::from),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VersionControl for FixedDescribe {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn describe(&self, path: &Path) -> Option<String> {
            self.calls.lock().unwrap().push(path.to_path_buf());
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_uses_described_tag() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = TagResolver::new(FixedDescribe::new(Some("v1.4.0-2-g1a2b3c4-dirty")));
        assert_eq!(resolver.resolve(dir.path()).await, "v1.4.0-2-g1a2b3c4-dirty");
    }

    #[tokio::test]
    async fn test_falls_back_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = TagResolver::new(FixedDescribe::new(None));
        assert_eq!(resolver.resolve(dir.path()).await, FALLBACK_TAG);
    }

    #[tokio::test]
    async fn test_falls_back_on_missing_directory() {
        let vcs = FixedDescribe::new(Some("v1"));
        let resolver = TagResolver::new(vcs.clone());
        let tag = resolver.resolve(Path::new("/definitely/not/here")).await;
        assert_eq!(tag, FALLBACK_TAG);
        assert!(vcs.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_override_skips_version_control() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = FixedDescribe::new(Some("v1"));
        let resolver = TagResolver::with_override(vcs.clone(), "dev").unwrap();
        assert_eq!(resolver.resolve(dir.path()).await, "dev");
        assert!(vcs.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = TagResolver::with_override(FixedDescribe::new(None), "has space")
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidImageReference(_)));
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("release/v2.0"), Some("release-v2.0".to_string()));
        assert_eq!(sanitize_tag("v1\n"), Some("v1".to_string()));
        assert_eq!(sanitize_tag("///"), None);
        assert_eq!(sanitize_tag(&"x".repeat(200)).unwrap().len(), MAX_TAG_LEN);
    }
}
