//! Rebuild an upstream x86_64 AppImage as an ARM64 AppImage.
//!
//! Some upstreams publish their Linux desktop build only as an x86_64
//! AppImage, with the ARM64 application payload shipped separately as a
//! tarball in the same release. This crate automates the repackaging:
//!
//! - **Release resolution** - GitHub Releases API lookup (latest, by tag,
//!   or by version) with bounded retry
//! - **Asset download** - idempotent, reusing finished downloads on disk
//! - **Offset discovery** - squashfs signature scan validated by trial
//!   `unsquashfs` inspection
//! - **Overlay and repack** - ARM64 payload copied over the extracted
//!   AppDir, reassembled with `appimagetool`
//! - **Validation and manifest** - architecture checks, SHA-256 sidecar,
//!   key-value env file for CI consumption
//!
//! # Architecture
//!
//! ```text
//! release  ──▶  fetch assets  ──▶  appimage (offset, extract)
//!                                      │
//!                                  overlay (payload)
//!                                      │
//!                                  appimage (repack)
//!                                      │
//!                              validate ──▶ manifest
//! ```
//!
//! The squashfs and AppImage container formats are consumed as black
//! boxes via `unsquashfs`, `mksquashfs`, and `appimagetool`; see
//! [`preflight`] for the host tool requirements.

pub mod appimage;
pub mod manifest;
pub mod overlay;
pub mod pipeline;
pub mod preflight;
pub mod release;
pub mod validate;

mod fsutil;

pub use manifest::BuildManifest;
pub use pipeline::{run, RebuildConfig, WorkPaths};
pub use release::{Release, ReleaseAsset, ReleaseClient, ReleaseQuery};
