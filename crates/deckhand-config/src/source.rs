//! Where the component source tree comes from.

use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

/// Repository cloned when no source is configured.
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/your-org/platform.git";

// scp-like git remotes: git@github.com:org/repo.git
static SCP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+@[A-Za-z0-9.-]+:[^/]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositorySource {
    /// Clone from a remote URL.
    Remote(String),
    /// Use an existing checkout.
    Local(PathBuf),
}

impl RepositorySource {
    /// Interpret the repository setting.
    ///
    /// Unset or blank selects [`DEFAULT_REPOSITORY_URL`]; anything that looks
    /// like a git remote is cloned; everything else is a local path.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => RepositorySource::Remote(DEFAULT_REPOSITORY_URL.to_string()),
            Some(s) if is_remote(s) => RepositorySource::Remote(s.to_string()),
            Some(s) => RepositorySource::Local(PathBuf::from(s)),
        }
    }
}

impl fmt::Display for RepositorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositorySource::Remote(url) => write!(f, "{}", url),
            RepositorySource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

fn is_remote(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "https" | "http" | "ssh" | "git" | "file"),
        Err(_) => SCP_REGEX.is_match(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_uses_default_remote() {
        assert_eq!(
            RepositorySource::parse(None),
            RepositorySource::Remote(DEFAULT_REPOSITORY_URL.to_string())
        );
        assert_eq!(
            RepositorySource::parse(Some("  ")),
            RepositorySource::Remote(DEFAULT_REPOSITORY_URL.to_string())
        );
    }

    #[test]
    fn test_urls_are_remote() {
        for url in [
            "https://github.com/acme/platform.git",
            "ssh://git@github.com/acme/platform.git",
            "git@github.com:acme/platform.git",
        ] {
            assert_eq!(
                RepositorySource::parse(Some(url)),
                RepositorySource::Remote(url.to_string())
            );
        }
    }

    #[test]
    fn test_display() {
        let remote = RepositorySource::parse(Some("git@github.com:acme/platform.git"));
        assert_eq!(remote.to_string(), "git@github.com:acme/platform.git");
        let local = RepositorySource::parse(Some("/src/platform"));
        assert_eq!(local.to_string(), "/src/platform");
    }

    #[test]
    fn test_paths_are_local() {
        for path in ["../platform", "/src/platform", "C:\\src\\platform", "platform"] {
            assert_eq!(
                RepositorySource::parse(Some(path)),
                RepositorySource::Local(PathBuf::from(path))
            );
        }
    }
}
