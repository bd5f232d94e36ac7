//! Error types for deckhand.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown {catalog} '{value}' (expected one of: {expected})")]
    UnknownIdentifier {
        catalog: &'static str,
        value: String,
        expected: String,
    },

    #[error("invalid image reference: {0}")]
    InvalidImageReference(String),

    #[error(
        "build failed for {image} after {count} attempts: {joined}",
        count = .attempts.len(),
        joined = .attempts.join("; ")
    )]
    BuildFailed { image: String, attempts: Vec<String> },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{0} not found, is it installed and on PATH?")]
    ToolNotFound(String),

    #[error("{tool} timed out after {}", humanize(.timeout))]
    Timeout { tool: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classes of failure, used to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad user input. Surfaced before anything is mutated.
    Input,
    /// A descriptor or document the run depends on is absent.
    ResourceMissing,
    /// An external tool exited non-zero, timed out, or could not be started.
    ExternalTool,
    /// Recovered locally with a safe default and never surfaced.
    Degradable,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownIdentifier { .. } | Error::InvalidImageReference(_) => {
                ErrorCategory::Input
            }
            Error::BuildFailed { .. }
            | Error::ToolFailed { .. }
            | Error::ToolNotFound(_)
            | Error::Timeout { .. }
            | Error::Io(_) => ErrorCategory::ExternalTool,
        }
    }
}

fn humanize(timeout: &Duration) -> String {
    format!("{}s", timeout.as_secs())
}

pub type Result<T> = std::result::Result<T, Error>;
