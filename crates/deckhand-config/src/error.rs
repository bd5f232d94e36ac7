//! Configuration errors.

use deckhand_core::ErrorCategory;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("build descriptor not found: {0}")]
    DescriptorNotFound(PathBuf),

    #[error("no IMG assignment in {0}")]
    ImageKeyMissing(PathBuf),

    #[error("invalid image name '{name}' in {path}")]
    InvalidImageName { name: String, path: PathBuf },

    #[error("kustomization document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error(transparent)]
    Core(#[from] deckhand_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::DescriptorNotFound(_)
            | ConfigError::DocumentNotFound(_)
            | ConfigError::ImageKeyMissing(_) => ErrorCategory::ResourceMissing,
            ConfigError::InvalidImageName { .. }
            | ConfigError::Parse(_)
            | ConfigError::InvalidValue { .. } => ErrorCategory::Input,
            ConfigError::WriteFailed { .. } | ConfigError::Io(_) => ErrorCategory::ExternalTool,
            ConfigError::Core(e) => e.category(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
