//! Standalone image pinning command.

use anyhow::{Context, Result};
use deckhand_config::{PatchCase, pin_image};
use deckhand_core::ImageReference;
use std::path::Path;

/// Pin `image` (as `name:tag`) into the kustomization at `document`.
pub fn pin(document: &Path, image: &str) -> Result<()> {
    let image: ImageReference = image.parse()?;

    let outcome = pin_image(document, &image)
        .with_context(|| format!("Failed to pin {} in {}", image, document.display()))?;

    if !outcome.changed {
        println!("✓ {} already pinned in {}", image, document.display());
        return Ok(());
    }

    let how = match outcome.case {
        PatchCase::UpdatedEntry => "updated existing entry",
        PatchCase::InsertedEntry => "added entry",
        PatchCase::AppendedSection => "added images section",
    };
    println!("✓ Pinned {} in {} ({})", image, document.display(), how);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reference_leaves_document_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kustomization.yaml");
        std::fs::write(&path, "resources:\n- manager.yaml\n").unwrap();

        assert!(pin(&path, "registry/app:bad tag").is_err());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "resources:\n- manager.yaml\n"
        );
    }

    #[test]
    fn test_pins_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kustomization.yaml");
        std::fs::write(&path, "resources:\n- manager.yaml\n").unwrap();

        pin(&path, "controller:v0.3.1").unwrap();
        assert!(
            std::fs::read_to_string(&path)
                .unwrap()
                .ends_with("images:\n- name: controller\n  newName: controller\n  newTag: v0.3.1\n")
        );
    }
}
