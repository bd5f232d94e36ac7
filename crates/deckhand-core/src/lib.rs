//! Core domain types and traits for deckhand.
//!
//! This crate contains:
//! - Image references and their grammar
//! - The fixed component catalogs and selection parsing
//! - Host platform detection
//! - Deployment tag resolution
//! - Collaborator traits for the external build/stage/render/apply tools

pub mod catalog;
pub mod error;
pub mod id;
pub mod image;
pub mod platform;
pub mod selection;
pub mod tag;
pub mod tooling;

pub use catalog::{AppComponent, Catalog, Component, ControllerComponent, Role};
pub use error::{Error, ErrorCategory, Result};
pub use id::RunId;
pub use image::ImageReference;
pub use platform::Platform;
pub use selection::select;
pub use tag::TagResolver;
