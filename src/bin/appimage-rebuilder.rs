use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use appimage_rebuilder::pipeline::{run, RebuildConfig};
use appimage_rebuilder::preflight;
use appimage_rebuilder::release::ReleaseQuery;

/// Rebuild an upstream x86_64 AppImage as an ARM64 AppImage.
///
/// Combines the upstream AppImage shell with the separately published
/// ARM64 tarball payload from the same GitHub release, then reassembles
/// the container for aarch64. Set GITHUB_TOKEN for authenticated API
/// calls.
#[derive(Parser, Debug)]
#[command(name = "appimage-rebuilder", disable_version_flag = true)]
struct Cli {
    /// Upstream GitHub repository (owner/name).
    #[arg(long, env = "UPSTREAM_REPO", value_name = "OWNER/NAME")]
    repo: String,

    /// Upstream application version to rebuild (tries the v-prefixed tag
    /// first). Defaults to the latest release.
    #[arg(long, value_name = "VERSION", conflicts_with = "tag")]
    version: Option<String>,

    /// Exact upstream release tag to rebuild.
    #[arg(long, value_name = "TAG")]
    tag: Option<String>,

    /// Scratch directory for downloads and extraction.
    #[arg(long, value_name = "DIR", default_value = ".artifacts/work")]
    work_dir: PathBuf,

    /// Directory for the rebuilt AppImage, checksum, and env file.
    #[arg(long, value_name = "DIR", default_value = ".artifacts/out")]
    output_dir: PathBuf,

    /// Skip architecture validation of the AppDir and the output.
    #[arg(long)]
    skip_validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    preflight::check_host_tools()?;

    let query = match (cli.tag, cli.version) {
        (Some(tag), _) => ReleaseQuery::Tag(tag),
        (None, Some(version)) => ReleaseQuery::Version(version),
        (None, None) => ReleaseQuery::Latest,
    };

    let config = RebuildConfig {
        repo: cli.repo,
        query,
        work_dir: cli.work_dir,
        output_dir: cli.output_dir,
        skip_validate: cli.skip_validate,
        github_token: std::env::var("GITHUB_TOKEN").ok(),
    };

    let manifest = run(&config)?;

    println!(
        "[done] {} (upstream {})",
        manifest.appimage.display(),
        manifest.upstream_tag
    );
    println!("[done] sha256 {}", manifest.sha256);
    Ok(())
}
