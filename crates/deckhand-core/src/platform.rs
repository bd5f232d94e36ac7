//! Target platform detection.

use derive_more::Display;
use serde::Serialize;
use tracing::warn;

/// Canonical build platform, derived once per run from the host processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum Platform {
    #[display("linux/amd64")]
    #[serde(rename = "linux/amd64")]
    LinuxAmd64,
    #[display("linux/arm64")]
    #[serde(rename = "linux/arm64")]
    LinuxArm64,
}

impl Platform {
    /// Detect the platform of the machine running deckhand.
    pub fn detect() -> Self {
        Self::from_arch(std::env::consts::ARCH)
    }

    /// Map a processor architecture name to a platform.
    ///
    /// Anything unrecognized falls back to `linux/amd64` with a warning.
    pub fn from_arch(arch: &str) -> Self {
        match arch {
            "aarch64" | "arm64" => Platform::LinuxArm64,
            "x86_64" | "amd64" => Platform::LinuxAmd64,
            other => {
                warn!(arch = %other, "Unrecognized host architecture, defaulting to linux/amd64");
                Platform::LinuxAmd64
            }
        }
    }

    /// Architecture component, as build tooling spells it.
    pub fn arch(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "amd64",
            Platform::LinuxArm64 => "arm64",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_architectures() {
        assert_eq!(Platform::from_arch("aarch64"), Platform::LinuxArm64);
        assert_eq!(Platform::from_arch("x86_64"), Platform::LinuxAmd64);
        assert_eq!(Platform::LinuxArm64.to_string(), "linux/arm64");
        assert_eq!(Platform::LinuxArm64.arch(), "arm64");
    }

    #[test]
    fn test_unknown_architecture_defaults_to_amd64() {
        assert_eq!(Platform::from_arch("riscv64"), Platform::LinuxAmd64);
        assert_eq!(Platform::from_arch("riscv64").to_string(), "linux/amd64");
    }
}
