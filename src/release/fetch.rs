//! HTTP access to the GitHub Releases API and asset downloads.
//!
//! The metadata fetch is the single retried operation in the whole
//! pipeline: bounded attempts with a doubling delay. Asset downloads fail
//! fast; reruns are cheap because finished downloads are reused.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::fsutil::partial_sibling;
use crate::release::{tag_candidates_for_version, Release, ReleaseAsset, ReleaseQuery};

const GITHUB_API: &str = "https://api.github.com";
const HTTP_USER_AGENT: &str = concat!("appimage-rebuilder/", env!("CARGO_PKG_VERSION"));

const FETCH_ATTEMPTS: u32 = 4;
const FETCH_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Blocking client for release metadata and asset downloads.
pub struct ReleaseClient {
    http: Client,
    token: Option<String>,
}

impl ReleaseClient {
    /// Build a client.
    ///
    /// `token` is a GitHub API token (typically `GITHUB_TOKEN` from the
    /// environment); it is sent only to the API host, never on asset
    /// downloads, which follow redirects to the release CDN.
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(HTTP_USER_AGENT)
            .build()
            .context("building HTTP client")?;
        let token = token.filter(|t| !t.trim().is_empty());
        Ok(Self { http, token })
    }

    /// Resolve a release descriptor for `repo` (`owner/name`).
    pub fn fetch_release(&self, repo: &str, query: &ReleaseQuery) -> Result<Release> {
        match query {
            ReleaseQuery::Latest => {
                let url = format!("{GITHUB_API}/repos/{repo}/releases/latest");
                match self.get_release_with_retry(&url)? {
                    Some(release) => Ok(release),
                    None => bail!("repository '{}' has no published releases", repo),
                }
            }
            ReleaseQuery::Tag(tag) => {
                let url = format!("{GITHUB_API}/repos/{repo}/releases/tags/{tag}");
                match self.get_release_with_retry(&url)? {
                    Some(release) => Ok(release),
                    None => bail!("release tag '{}' not found in '{}'", tag, repo),
                }
            }
            ReleaseQuery::Version(version) => {
                let candidates = tag_candidates_for_version(version);
                for tag in &candidates {
                    let url = format!("{GITHUB_API}/repos/{repo}/releases/tags/{tag}");
                    if let Some(release) = self.get_release_with_retry(&url)? {
                        return Ok(release);
                    }
                }
                bail!(
                    "no release matching version '{}' in '{}' (tried tags: {})",
                    version,
                    repo,
                    candidates.join(", ")
                )
            }
        }
    }

    /// Download `asset` to `dest`, reusing a finished download.
    ///
    /// Returns `false` when an existing file with the asset's exact size
    /// was reused. Fresh downloads land in a `.partial` sibling and are
    /// renamed into place only once complete, so an interrupted run never
    /// leaves a truncated file under the final name.
    pub fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<bool> {
        if asset.size > 0 {
            if let Ok(meta) = dest.metadata() {
                if meta.is_file() && meta.len() == asset.size {
                    return Ok(false);
                }
            }
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating download directory '{}'", parent.display()))?;
        }

        let partial = partial_sibling(dest);
        let mut response = self
            .http
            .get(&asset.browser_download_url)
            .header("Accept", "application/octet-stream")
            .send()
            .with_context(|| format!("downloading '{}'", asset.name))?;
        if !response.status().is_success() {
            bail!(
                "download of '{}' failed with HTTP {} from '{}'",
                asset.name,
                response.status(),
                asset.browser_download_url
            );
        }

        let file = File::create(&partial)
            .with_context(|| format!("creating '{}'", partial.display()))?;
        let mut writer = BufWriter::new(file);
        let written = io::copy(&mut response, &mut writer)
            .with_context(|| format!("writing '{}'", partial.display()))?;
        writer
            .flush()
            .with_context(|| format!("flushing '{}'", partial.display()))?;

        if asset.size > 0 && written != asset.size {
            bail!(
                "truncated download of '{}': expected {} bytes, got {}",
                asset.name,
                asset.size,
                written
            );
        }

        fs::rename(&partial, dest).with_context(|| {
            format!("renaming '{}' -> '{}'", partial.display(), dest.display())
        })?;
        Ok(true)
    }

    /// GET a release URL with bounded retry and doubling delay.
    ///
    /// A 404 resolves to `Ok(None)` immediately: a missing tag will not
    /// heal, and version queries probe tag candidates this way.
    fn get_release_with_retry(&self, url: &str) -> Result<Option<Release>> {
        let mut delay = FETCH_INITIAL_DELAY;
        for attempt in 1..=FETCH_ATTEMPTS {
            match self.get_release_once(url) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    if attempt == FETCH_ATTEMPTS {
                        return Err(err).with_context(|| {
                            format!(
                                "fetching release metadata from '{}' ({} attempts)",
                                url, FETCH_ATTEMPTS
                            )
                        });
                    }
                    println!(
                        "[release] fetch attempt {}/{} failed ({:#}); retrying in {}s",
                        attempt,
                        FETCH_ATTEMPTS,
                        err,
                        delay.as_secs()
                    );
                    thread::sleep(delay);
                    delay *= 2;
                }
            }
        }
        unreachable!("final attempt returns above")
    }

    fn get_release_once(&self, url: &str) -> Result<Option<Release>> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .with_context(|| format!("requesting '{}'", url))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("GitHub API returned {} for '{}': {}", status, url, body.trim());
        }

        let release = response
            .json::<Release>()
            .with_context(|| format!("parsing release metadata from '{}'", url))?;
        Ok(Some(release))
    }
}
