//! Configuration handling for deckhand.
//!
//! This crate handles:
//! - Reading the image name a build descriptor declares
//! - Pinning image references into kustomization documents
//! - The optional `deckhand.kdl` settings file
//! - Interpreting the repository source setting

pub mod descriptor;
pub mod error;
pub mod kustomize;
pub mod settings;
pub mod source;

pub use descriptor::resolve_image_name;
pub use error::{ConfigError, ConfigResult};
pub use kustomize::{ConfigDocument, ImagePinEntry, PatchCase, PatchOutcome, pin_image, write_atomic};
pub use settings::{SETTINGS_FILE, Settings, load_settings, parse_settings};
pub use source::{DEFAULT_REPOSITORY_URL, RepositorySource};
