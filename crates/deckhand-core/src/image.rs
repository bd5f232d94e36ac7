//! Container image references.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::{Error, Result};

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").unwrap());

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,128}$").unwrap());

/// Maximum length of an image tag.
pub const MAX_TAG_LEN: usize = 128;

/// Whether `name` is a valid image name (repository path without a tag).
pub fn is_valid_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

/// Whether `tag` is a valid image tag.
pub fn is_valid_tag(tag: &str) -> bool {
    TAG_REGEX.is_match(tag)
}

/// A validated `name:tag` pair.
///
/// Fields are private so every value in circulation has passed the grammar
/// checks. Re-pinning builds a new value instead of mutating an old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageReference {
    name: String,
    tag: String,
}

impl ImageReference {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let tag = tag.into();

        if !is_valid_name(&name) {
            return Err(Error::InvalidImageReference(format!(
                "name '{}' must match [A-Za-z0-9._/-]+",
                name
            )));
        }
        if !is_valid_tag(&tag) {
            return Err(Error::InvalidImageReference(format!(
                "tag '{}' must match [A-Za-z0-9._-]{{1,{}}}",
                tag, MAX_TAG_LEN
            )));
        }

        Ok(Self { name, tag })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    /// Parses `name:tag`, splitting at the last colon.
    fn from_str(s: &str) -> Result<Self> {
        let (name, tag) = s.trim().rsplit_once(':').ok_or_else(|| {
            Error::InvalidImageReference(format!("'{}' is missing a ':<tag>' suffix", s))
        })?;
        Self::new(name, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_reference() {
        let image = ImageReference::new("registry.example.com/ns/app", "v1.2.0-3-gabc123-dirty")
            .unwrap();
        assert_eq!(image.name(), "registry.example.com/ns/app");
        assert_eq!(image.tag(), "v1.2.0-3-gabc123-dirty");
        assert_eq!(
            image.to_string(),
            "registry.example.com/ns/app:v1.2.0-3-gabc123-dirty"
        );
    }

    #[test]
    fn test_rejects_bad_name() {
        assert!(ImageReference::new("registry/app name", "v1").is_err());
        assert!(ImageReference::new("", "v1").is_err());
        assert!(ImageReference::new("localhost:5000/app", "v1").is_err());
    }

    #[test]
    fn test_rejects_bad_tag() {
        assert!(ImageReference::new("app", "").is_err());
        assert!(ImageReference::new("app", "feature/x").is_err());
        assert!(ImageReference::new("app", "a".repeat(129)).is_err());
        assert!(ImageReference::new("app", "a".repeat(128)).is_ok());
    }

    #[test]
    fn test_parse() {
        let image: ImageReference = "registry/app:v1-dirty".parse().unwrap();
        assert_eq!(image.name(), "registry/app");
        assert_eq!(image.tag(), "v1-dirty");

        let err = "registry/app".parse::<ImageReference>().unwrap_err();
        assert!(matches!(err, Error::InvalidImageReference(_)));
    }
}
