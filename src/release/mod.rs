//! GitHub release metadata and asset selection.
//!
//! A rebuild consumes exactly two assets from one upstream release: the
//! x86_64 AppImage (the application shell) and the separately published
//! ARM64 tarball payload. This module models the release descriptor and
//! the policy for picking those two assets out of the asset list.
//!
//! The release descriptor is transient: fetched, consumed, discarded.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::fmt;

mod fetch;

pub use fetch::ReleaseClient;

/// One downloadable asset attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
}

/// A release descriptor as returned by the GitHub Releases API.
///
/// The API response carries many more fields; only the ones the pipeline
/// consumes are deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

/// Which upstream release to rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseQuery {
    /// The latest published release.
    Latest,
    /// An exact release tag, e.g. `v1.2.3`.
    Tag(String),
    /// An application version, resolved by trying the `v`-prefixed tag
    /// first and the bare version second.
    Version(String),
}

impl fmt::Display for ReleaseQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseQuery::Latest => write!(f, "latest release"),
            ReleaseQuery::Tag(tag) => write!(f, "release tag '{tag}'"),
            ReleaseQuery::Version(version) => write!(f, "version '{version}'"),
        }
    }
}

/// The two assets a rebuild needs.
#[derive(Debug, Clone, Copy)]
pub struct SelectedAssets<'a> {
    /// Upstream x86_64 AppImage (application shell).
    pub appimage: &'a ReleaseAsset,
    /// ARM64 tarball payload.
    pub payload: &'a ReleaseAsset,
}

/// Derive the application version from a release tag.
///
/// Strips a leading `v` when it prefixes a digit (`v1.2.3` -> `1.2.3`);
/// any other tag is returned unchanged.
pub fn version_from_tag(tag: &str) -> &str {
    match tag.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => tag,
    }
}

/// Tag names to try, in order, when resolving a version query.
pub(crate) fn tag_candidates_for_version(version: &str) -> Vec<String> {
    if version.starts_with('v') {
        vec![version.to_string()]
    } else {
        vec![format!("v{version}"), version.to_string()]
    }
}

fn is_arm64_name(name: &str) -> bool {
    name.contains("arm64") || name.contains("aarch64")
}

fn is_payload_tarball(name: &str) -> bool {
    name.ends_with(".tar.gz")
        || name.ends_with(".tgz")
        || name.ends_with(".tar.zst")
        || name.ends_with(".tar")
}

/// Pick the x86_64 AppImage and the ARM64 payload tarball out of a release.
///
/// AppImage selection prefers an explicit `x86_64`/`amd64` tag in the file
/// name but accepts an untagged `.AppImage` (many upstreams publish only
/// one). Either asset missing is fatal and the error names every asset the
/// release did carry, so the failure is diagnosable from CI logs alone.
pub fn select_assets(release: &Release) -> Result<SelectedAssets<'_>> {
    let mut untagged_appimage = None;
    let mut tagged_appimage = None;
    let mut payload = None;

    for asset in &release.assets {
        let lower = asset.name.to_ascii_lowercase();
        if lower.ends_with(".appimage") && !is_arm64_name(&lower) {
            if lower.contains("x86_64") || lower.contains("amd64") {
                tagged_appimage.get_or_insert(asset);
            } else {
                untagged_appimage.get_or_insert(asset);
            }
        } else if is_arm64_name(&lower) && is_payload_tarball(&lower) {
            payload.get_or_insert(asset);
        }
    }

    let appimage = tagged_appimage.or(untagged_appimage);
    match (appimage, payload) {
        (Some(appimage), Some(payload)) => Ok(SelectedAssets { appimage, payload }),
        (None, _) => bail!(
            "release '{}' has no x86_64 AppImage asset; assets present: {}",
            release.tag_name,
            asset_names(release)
        ),
        (_, None) => bail!(
            "release '{}' has no ARM64 tarball payload asset; assets present: {}",
            release.tag_name,
            asset_names(release)
        ),
    }
}

fn asset_names(release: &Release) -> String {
    if release.assets.is_empty() {
        return "(none)".to_string();
    }
    release
        .assets
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
