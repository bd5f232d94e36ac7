//! Deployment errors, tagged with the stage that failed.

use deckhand_config::ConfigError;
use deckhand_core::ErrorCategory;
use derive_more::Display;
use serde::Serialize;
use thiserror::Error;

/// The step of a component deployment that was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum DeployStage {
    #[display("resolve")]
    Resolving,
    #[display("build")]
    Building,
    #[display("stage")]
    Staging,
    #[display("patch")]
    Patching,
    #[display("deploy")]
    Deploying,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{stage} failed: {source}")]
    Core {
        stage: DeployStage,
        #[source]
        source: deckhand_core::Error,
    },

    #[error("{stage} failed: {source}")]
    Config {
        stage: DeployStage,
        #[source]
        source: ConfigError,
    },
}

impl DeployError {
    pub fn core(stage: DeployStage, source: deckhand_core::Error) -> Self {
        DeployError::Core { stage, source }
    }

    pub fn config(stage: DeployStage, source: ConfigError) -> Self {
        DeployError::Config { stage, source }
    }

    pub fn stage(&self) -> DeployStage {
        match self {
            DeployError::Core { stage, .. } | DeployError::Config { stage, .. } => *stage,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::Core { source, .. } => source.category(),
            DeployError::Config { source, .. } => source.category(),
        }
    }

    /// The underlying failure without the stage prefix.
    pub fn detail(&self) -> String {
        match self {
            DeployError::Core { source, .. } => source.to_string(),
            DeployError::Config { source, .. } => source.to_string(),
        }
    }
}
