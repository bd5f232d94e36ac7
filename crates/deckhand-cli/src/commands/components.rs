//! Component catalog listing.

use deckhand_core::{AppComponent, Catalog, Component, ControllerComponent};
use std::path::Path;

/// Print every known component with the paths it is deployed from.
pub fn list() {
    let components = ControllerComponent::ALL
        .iter()
        .copied()
        .map(Component::from)
        .chain(AppComponent::ALL.iter().copied().map(Component::from));

    let root = Path::new("");
    for component in components {
        println!("{} ({})", component.name(), component.role());
        println!("  descriptor: {}", component.descriptor(root).display());
        println!("  document:   {}", component.document(root).display());
        println!("  overlay:    {}", component.overlay(root).display());
    }
}
