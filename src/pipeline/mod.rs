//! The sequential rebuild pipeline.
//!
//! One invocation, one linear pass:
//!
//! ```text
//! resolve release -> download shell + payload -> find squashfs offset
//!     -> extract AppDir -> overlay ARM64 payload -> repack
//!     -> validate architecture -> checksum + env file
//! ```
//!
//! Each stage fully completes before the next begins; any failure is
//! fatal. The only state shared between runs is the downloads directory,
//! reused when the same release is rebuilt again.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::appimage::{extract_appdir, find_squashfs_offset, repack_appdir};
use crate::manifest::{
    sha256_file, utc_timestamp, write_checksum_file, BuildManifest,
};
use crate::overlay::{extract_payload, overlay_dir};
use crate::release::{select_assets, version_from_tag, ReleaseClient, ReleaseQuery};
use crate::validate::{check_appdir_arch, check_output_arch};

/// Name of the key-value file written next to the rebuilt AppImage.
pub const ENV_FILE_NAME: &str = "build.env";

/// Everything one rebuild needs to know.
#[derive(Debug, Clone)]
pub struct RebuildConfig {
    /// Upstream GitHub repository, `owner/name`.
    pub repo: String,
    /// Which release to rebuild.
    pub query: ReleaseQuery,
    /// Scratch directory for downloads and extraction.
    pub work_dir: PathBuf,
    /// Where the rebuilt AppImage, checksum, and env file land.
    pub output_dir: PathBuf,
    /// Skip the AppDir and output architecture checks.
    pub skip_validate: bool,
    /// GitHub API token, if the environment provides one.
    pub github_token: Option<String>,
}

/// Scratch layout under the work directory.
pub struct WorkPaths {
    /// Downloaded release assets, reused across runs.
    pub downloads: PathBuf,
    /// Extracted AppDir (squashfs contents).
    pub appdir: PathBuf,
    /// Unpacked ARM64 payload.
    pub payload: PathBuf,
}

impl WorkPaths {
    /// Create paths relative to the work directory.
    pub fn new(work_dir: &Path) -> Self {
        Self {
            downloads: work_dir.join("downloads"),
            appdir: work_dir.join("appdir"),
            payload: work_dir.join("payload"),
        }
    }
}

/// Output file name for a rebuilt AppImage.
///
/// Rewrites the architecture tag in the upstream file name; an untagged
/// name gets `-aarch64` inserted before the suffix.
pub fn output_name_for(upstream_name: &str) -> String {
    for marker in ["x86_64", "x86-64", "amd64"] {
        if upstream_name.contains(marker) {
            return upstream_name.replace(marker, "aarch64");
        }
    }
    let lower = upstream_name.to_ascii_lowercase();
    match lower.rfind(".appimage") {
        Some(pos) => format!(
            "{}-aarch64{}",
            &upstream_name[..pos],
            &upstream_name[pos..]
        ),
        None => format!("{upstream_name}-aarch64"),
    }
}

/// Run the full rebuild.
pub fn run(config: &RebuildConfig) -> Result<BuildManifest> {
    if config.repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
        bail!(
            "invalid repository '{}'; expected 'owner/name'",
            config.repo
        );
    }

    let paths = WorkPaths::new(&config.work_dir);
    fs::create_dir_all(&paths.downloads).with_context(|| {
        format!(
            "creating downloads directory '{}'",
            paths.downloads.display()
        )
    })?;
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "creating output directory '{}'",
            config.output_dir.display()
        )
    })?;

    println!("[release] resolving {} from '{}'", config.query, config.repo);
    let client = ReleaseClient::new(config.github_token.clone())?;
    let release = client.fetch_release(&config.repo, &config.query)?;
    let version = version_from_tag(&release.tag_name).to_string();
    println!(
        "[release] tag '{}' (version {}, {} assets)",
        release.tag_name,
        version,
        release.assets.len()
    );

    let assets = select_assets(&release)?;
    let appimage_path = paths.downloads.join(&assets.appimage.name);
    let payload_path = paths.downloads.join(&assets.payload.name);
    for (asset, dest) in [
        (assets.appimage, &appimage_path),
        (assets.payload, &payload_path),
    ] {
        if client.download_asset(asset, dest)? {
            println!("[fetch] downloaded '{}' ({} bytes)", asset.name, asset.size);
        } else {
            println!("[fetch] reusing '{}'", dest.display());
        }
    }

    let offset = find_squashfs_offset(&appimage_path)?;
    println!("[offset] squashfs image at byte offset {}", offset);

    extract_appdir(&appimage_path, offset, &paths.appdir)?;
    println!("[extract] AppDir at '{}'", paths.appdir.display());

    let payload_root = extract_payload(&payload_path, &paths.payload)?;
    let overlaid = overlay_dir(&payload_root, &paths.appdir)?;
    println!(
        "[overlay] {} files overlaid from '{}'",
        overlaid, assets.payload.name
    );

    if config.skip_validate {
        println!("[validate] skipped by request");
    } else {
        check_appdir_arch(&paths.appdir)?;
        println!("[validate] AppDir binaries are aarch64");
    }

    let output_name = output_name_for(&assets.appimage.name);
    let output_path = config.output_dir.join(&output_name);
    repack_appdir(&paths.appdir, &output_path)?;
    println!("[repack] '{}'", output_path.display());

    if !config.skip_validate {
        check_output_arch(&output_path)?;
        println!("[validate] '{}' reports aarch64", output_name);
    }

    let sha256 = sha256_file(&output_path)?;
    let checksum_path = write_checksum_file(&output_path, &sha256)?;
    let manifest = BuildManifest {
        appimage: output_path,
        sha256,
        upstream_tag: release.tag_name.clone(),
        upstream_version: version,
        built_at_utc: utc_timestamp()?,
    };
    let env_path = config.output_dir.join(ENV_FILE_NAME);
    manifest.write_env_file(&env_path)?;
    println!(
        "[manifest] wrote '{}' and '{}'",
        checksum_path.display(),
        env_path.display()
    );

    Ok(manifest)
}
