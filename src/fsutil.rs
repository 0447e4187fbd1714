//! Small filesystem helpers shared across pipeline stages.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Sibling path used while an artifact is being produced.
///
/// `/out/editor.AppImage` -> `/out/editor.AppImage.partial`. Finished
/// artifacts are renamed into place so a crashed run never leaves a
/// truncated file under the final name.
pub(crate) fn partial_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".partial");
    path.with_file_name(name)
}

/// Remove `dir` if present, then create it empty.
///
/// Extraction targets are recreated from scratch so reruns never see
/// leftovers from a previous, possibly different, release.
pub(crate) fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("removing existing directory '{}'", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("creating directory '{}'", dir.display()))?;
    Ok(())
}
