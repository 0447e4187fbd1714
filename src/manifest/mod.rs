//! Output artifacts accompanying the rebuilt AppImage.
//!
//! Every run produces a `sha256sum`-compatible checksum sidecar and a
//! key-value env file (`build.env`) recording the output path, upstream
//! tag/version, and checksum, for consumption by CI steps downstream.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Streaming SHA-256 of a file, as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 1024];
    loop {
        let n = r
            .read(&mut buf)
            .with_context(|| format!("reading '{}'", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write `<artifact>.sha256` next to the artifact.
///
/// Contents follow `sha256sum` output so `sha256sum -c` can verify:
/// `<hex><space><space><filename>\n`.
pub fn write_checksum_file(artifact: &Path, sha256: &str) -> Result<PathBuf> {
    let Some(name) = artifact.file_name().and_then(|n| n.to_str()) else {
        bail!(
            "cannot derive checksum file name for '{}'",
            artifact.display()
        );
    };
    let sidecar = artifact.with_file_name(format!("{name}.sha256"));
    fs::write(&sidecar, format!("{sha256}  {name}\n"))
        .with_context(|| format!("writing '{}'", sidecar.display()))?;
    Ok(sidecar)
}

/// Current time as an RFC 3339 UTC timestamp.
pub fn utc_timestamp() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("formatting build timestamp")
}

/// What a completed rebuild produced.
#[derive(Debug, Clone)]
pub struct BuildManifest {
    /// Path of the rebuilt AppImage.
    pub appimage: PathBuf,
    /// SHA-256 of the rebuilt AppImage, lowercase hex.
    pub sha256: String,
    /// Upstream release tag the rebuild consumed.
    pub upstream_tag: String,
    /// Application version derived from the tag.
    pub upstream_version: String,
    /// RFC 3339 UTC timestamp of the rebuild.
    pub built_at_utc: String,
}

impl BuildManifest {
    /// Render the manifest as `KEY=VALUE` lines.
    pub fn env_lines(&self) -> String {
        let name = self
            .appimage
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        format!(
            "APPIMAGE={}\n\
             APPIMAGE_NAME={}\n\
             APPIMAGE_SHA256={}\n\
             UPSTREAM_TAG={}\n\
             UPSTREAM_VERSION={}\n\
             BUILT_AT_UTC={}\n",
            self.appimage.display(),
            name,
            self.sha256,
            self.upstream_tag,
            self.upstream_version,
            self.built_at_utc
        )
    }

    /// Write the env file at `path`.
    pub fn write_env_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.env_lines())
            .with_context(|| format!("writing env file '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sha256_matches_known_vector() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("data");
        fs::write(&path, b"hello world").expect("write data");

        assert_eq!(
            sha256_file(&path).expect("hash"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn checksum_file_uses_sha256sum_format() {
        let temp = TempDir::new().expect("create temp dir");
        let artifact = temp.path().join("editor-aarch64.AppImage");
        fs::write(&artifact, b"appimage").expect("write artifact");

        let sidecar = write_checksum_file(&artifact, "deadbeef").expect("write sidecar");

        assert_eq!(sidecar, temp.path().join("editor-aarch64.AppImage.sha256"));
        assert_eq!(
            fs::read_to_string(&sidecar).expect("read sidecar"),
            "deadbeef  editor-aarch64.AppImage\n"
        );
    }

    #[test]
    fn env_file_records_every_key() {
        let temp = TempDir::new().expect("create temp dir");
        let manifest = BuildManifest {
            appimage: PathBuf::from("/out/editor-2.4.1-aarch64.AppImage"),
            sha256: "deadbeef".to_string(),
            upstream_tag: "v2.4.1".to_string(),
            upstream_version: "2.4.1".to_string(),
            built_at_utc: "2026-08-06T12:00:00Z".to_string(),
        };

        let path = temp.path().join("build.env");
        manifest.write_env_file(&path).expect("write env file");

        let contents = fs::read_to_string(&path).expect("read env file");
        assert!(contents.contains("APPIMAGE=/out/editor-2.4.1-aarch64.AppImage\n"));
        assert!(contents.contains("APPIMAGE_NAME=editor-2.4.1-aarch64.AppImage\n"));
        assert!(contents.contains("APPIMAGE_SHA256=deadbeef\n"));
        assert!(contents.contains("UPSTREAM_TAG=v2.4.1\n"));
        assert!(contents.contains("UPSTREAM_VERSION=2.4.1\n"));
        assert!(contents.contains("BUILT_AT_UTC=2026-08-06T12:00:00Z\n"));
    }

    #[test]
    fn utc_timestamp_is_rfc3339() {
        let ts = utc_timestamp().expect("format timestamp");
        assert!(ts.contains('T'), "got: {ts}");
        assert!(ts.ends_with('Z') || ts.contains('+'), "got: {ts}");
    }
}
