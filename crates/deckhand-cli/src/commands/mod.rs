//! CLI command implementations.

pub mod components;
pub mod deploy;
pub mod pin;
