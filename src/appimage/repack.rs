//! AppImage re-assembly via `appimagetool`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::fsutil::partial_sibling;

/// Repack `appdir` as an ARM64 AppImage at `output`.
///
/// `appimagetool` derives the target architecture from `ARCH`; without it
/// the tool inspects the AppDir's runtime and would tag the container
/// after the build host. appstream validation is skipped since the AppDir
/// is upstream's, not ours to fix.
pub fn repack_appdir(appdir: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }

    let partial = partial_sibling(output);
    let status = Command::new("appimagetool")
        .env("ARCH", "aarch64")
        .arg("--no-appstream")
        .arg(appdir)
        .arg(&partial)
        .status()
        .with_context(|| format!("running appimagetool for '{}'", appdir.display()))?;

    if !status.success() {
        bail!(
            "appimagetool failed with status {} packing '{}'",
            status,
            appdir.display()
        );
    }
    if !partial.is_file() {
        bail!(
            "appimagetool finished but produced no file at '{}'",
            partial.display()
        );
    }

    fs::rename(&partial, output).with_context(|| {
        format!("renaming '{}' -> '{}'", partial.display(), output.display())
    })?;
    Ok(())
}
