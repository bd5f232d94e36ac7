//! Build descriptor parsing.
//!
//! A component's Makefile declares the image it builds with an `IMG`
//! assignment, e.g. `IMG ?= registry.example.com/platform/api:latest`. The
//! declared name (without its tag) is the key the kustomization pin is
//! matched on.

use deckhand_core::image::is_valid_name;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::{ConfigError, ConfigResult};

/// Variable holding the image reference in a build descriptor.
pub const IMAGE_KEY: &str = "IMG";

// `KEY = v`, `KEY ?= v`, `KEY := v`, optionally prefixed with `export`
static ASSIGNMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*(\?=|::=|:=|=)\s*(.*)$").unwrap()
});

/// Read the declared image name from the descriptor at `path`.
pub fn resolve_image_name(path: &Path) -> ConfigResult<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::DescriptorNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parse_image_name(&content, path)
}

/// Extract the declared image name from descriptor text.
///
/// `path` is only used for error messages.
pub fn parse_image_name(content: &str, path: &Path) -> ConfigResult<String> {
    let raw = content
        .lines()
        // Recipe lines are shell, not assignments.
        .filter(|line| !line.starts_with('\t'))
        .filter_map(|line| ASSIGNMENT_REGEX.captures(line.trim()))
        .find(|caps| &caps[1] == IMAGE_KEY)
        .map(|caps| caps[3].to_string())
        .ok_or_else(|| ConfigError::ImageKeyMissing(path.to_path_buf()))?;

    let name = strip_reference_suffix(&clean_value(&raw));
    if !is_valid_name(&name) {
        return Err(ConfigError::InvalidImageName {
            name,
            path: path.to_path_buf(),
        });
    }

    Ok(name)
}

/// Drop a trailing comment and surrounding quotes from an assignment value.
fn clean_value(raw: &str) -> String {
    let value = match raw.find('#') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let value = value.trim();

    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    value.to_string()
}

/// Remove a `@digest` and a `:tag` from an image reference.
///
/// A colon before the last `/` belongs to a registry host, not a tag, and is
/// left alone (such names then fail the name grammar).
fn strip_reference_suffix(reference: &str) -> String {
    let reference = match reference.split_once('@') {
        Some((name, _digest)) => name,
        None => reference,
    };

    let last_segment = reference.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    match reference[last_segment..].rfind(':') {
        Some(idx) => reference[..last_segment + idx].to_string(),
        None => reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(content: &str) -> ConfigResult<String> {
        parse_image_name(content, Path::new("Makefile"))
    }

    #[test]
    fn test_default_assignment() {
        assert_eq!(parse("IMG ?= registry/app\n").unwrap(), "registry/app");
    }

    #[test]
    fn test_plain_assignment_strips_tag() {
        let content = "VERSION = 1.0\nIMG = registry.example.com/ns/app:v1.0  # built by CI\n";
        assert_eq!(parse(content).unwrap(), "registry.example.com/ns/app");
    }

    #[test]
    fn test_first_assignment_wins() {
        let content = "IMG ?= first/app:latest\nIMG = second/app\n";
        assert_eq!(parse(content).unwrap(), "first/app");
    }

    #[test]
    fn test_similar_keys_ignored() {
        let content = "IMG_PULL_POLICY = Always\nBASE_IMG = base/img\nIMG := real/app\n";
        assert_eq!(parse(content).unwrap(), "real/app");
    }

    #[test]
    fn test_recipe_lines_ignored() {
        let content = "docker-build:\n\tIMG=wrong/app docker build .\n";
        assert!(matches!(
            parse(content).unwrap_err(),
            ConfigError::ImageKeyMissing(_)
        ));
    }

    #[test]
    fn test_digest_and_quotes() {
        assert_eq!(
            parse("IMG ?= \"registry/app@sha256:abcdef\"\n").unwrap(),
            "registry/app"
        );
    }

    #[test]
    fn test_missing_key() {
        let err = parse("VERSION ?= 0.1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ImageKeyMissing(_)));
    }

    #[test]
    fn test_invalid_name() {
        let err = parse("IMG ?= $(REGISTRY)/app:latest\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidImageName { .. }));

        let err = parse("IMG ?= localhost:5000/app\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidImageName { ref name, .. } if name == "localhost:5000/app"));

        let err = parse("IMG ?=\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidImageName { .. }));
    }

    #[test]
    fn test_descriptor_not_found() {
        let err = resolve_image_name(&PathBuf::from("/no/such/Makefile")).unwrap_err();
        assert!(matches!(err, ConfigError::DescriptorNotFound(_)));
    }

    #[test]
    fn test_reads_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Makefile");
        std::fs::write(&path, "# Image URL to use all building/pushing image targets\nIMG ?= controller:latest\n").unwrap();
        assert_eq!(resolve_image_name(&path).unwrap(), "controller");
    }
}
