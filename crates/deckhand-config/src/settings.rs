//! Optional `deckhand.kdl` settings file.
//!
//! ```kdl
//! repository "https://github.com/your-org/platform.git"
//! namespace "platform-system"
//! timeout "15m"
//! cluster "dev"
//! controllers "tenant-controller" "quota-controller"
//! apps
//! ```
//!
//! Every node is optional. Command-line flags and environment variables take
//! precedence over values read here. A selection node with no arguments
//! (`apps` above) is an explicit empty selection.

use kdl::{KdlDocument, KdlNode};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::{ConfigError, ConfigResult};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "deckhand.kdl";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub repository: Option<String>,
    pub namespace: Option<String>,
    pub timeout: Option<Duration>,
    pub cluster: Option<String>,
    pub tag: Option<String>,
    /// Comma-joined controller selection.
    pub controllers: Option<String>,
    /// Comma-joined app selection.
    pub apps: Option<String>,
}

/// Parse settings from KDL text.
pub fn parse_settings(kdl: &str) -> ConfigResult<Settings> {
    let doc: KdlDocument = kdl.parse()?;
    let mut settings = Settings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "repository" => settings.repository = Some(required_string(node)?),
            "namespace" => settings.namespace = Some(required_string(node)?),
            "cluster" => settings.cluster = Some(required_string(node)?),
            "tag" => settings.tag = Some(required_string(node)?),
            "timeout" => {
                let raw = required_string(node)?;
                let timeout =
                    humantime::parse_duration(&raw).map_err(|e| ConfigError::InvalidValue {
                        field: "timeout".to_string(),
                        message: format!("'{}': {}", raw, e),
                    })?;
                settings.timeout = Some(timeout);
            }
            "controllers" => settings.controllers = Some(get_all_string_args(node).join(",")),
            "apps" => settings.apps = Some(get_all_string_args(node).join(",")),
            other => warn!(node = %other, "Ignoring unknown settings node"),
        }
    }

    Ok(settings)
}

/// Load settings from `path`, or `None` if the file does not exist.
pub fn load_settings(path: &Path) -> ConfigResult<Option<Settings>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_settings(&content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn required_string(node: &KdlNode) -> ConfigResult<String> {
    get_first_string_arg(node).ok_or_else(|| ConfigError::InvalidValue {
        field: node.name().value().to_string(),
        message: "expected a string argument".to_string(),
    })
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let kdl = r#"
            repository "https://github.com/your-org/platform.git"
            namespace "platform-system"
            timeout "15m"
            cluster "dev"
            tag "dev-build"
            controllers "tenant-controller" "quota-controller"
            apps
        "#;

        let settings = parse_settings(kdl).unwrap();
        assert_eq!(
            settings.repository.as_deref(),
            Some("https://github.com/your-org/platform.git")
        );
        assert_eq!(settings.namespace.as_deref(), Some("platform-system"));
        assert_eq!(settings.timeout, Some(Duration::from_secs(900)));
        assert_eq!(settings.cluster.as_deref(), Some("dev"));
        assert_eq!(settings.tag.as_deref(), Some("dev-build"));
        assert_eq!(
            settings.controllers.as_deref(),
            Some("tenant-controller,quota-controller")
        );
        assert_eq!(settings.apps.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_settings() {
        assert_eq!(parse_settings("").unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_timeout() {
        let err = parse_settings(r#"timeout "soon""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "timeout"));
    }

    #[test]
    fn test_missing_argument() {
        let err = parse_settings("namespace").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            parse_settings("namespace \"unterminated").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(&dir.path().join(SETTINGS_FILE)).unwrap(), None);
    }
}
