//! AppDir extraction via `unsquashfs`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

/// Extract the squashfs image embedded in `image` at `offset` into `dest`.
///
/// A pre-existing `dest` is removed first so reruns start clean.
pub fn extract_appdir(image: &Path, offset: u64, dest: &Path) -> Result<()> {
    // unsquashfs creates the destination itself; hand it a clean slate.
    if dest.exists() {
        fs::remove_dir_all(dest)
            .with_context(|| format!("removing stale AppDir '{}'", dest.display()))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating '{}'", parent.display()))?;
    }

    let output = Command::new("unsquashfs")
        .arg("-o")
        .arg(offset.to_string())
        .arg("-d")
        .arg(dest)
        .arg(image)
        .output()
        .with_context(|| format!("running unsquashfs for '{}'", image.display()))?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "unsquashfs failed extracting '{}' (offset {}) into '{}': {}\n{}",
            image.display(),
            offset,
            dest.display(),
            stdout.trim(),
            stderr.trim()
        );
    }

    if !dest.is_dir() {
        bail!(
            "unsquashfs finished but AppDir is missing at '{}'",
            dest.display()
        );
    }

    Ok(())
}
