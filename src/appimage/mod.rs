//! AppImage container handling.
//!
//! A type-2 AppImage is an ELF runtime with a squashfs image appended at
//! an unadvertised byte offset. The container format is consumed as a
//! black box: offset discovery is a byte-pattern scan validated by trial
//! `unsquashfs` inspection, extraction and repacking shell out to
//! `unsquashfs` and `appimagetool`.

mod extract;
mod offset;
mod repack;

pub use extract::extract_appdir;
pub use offset::{find_squashfs_offset, scan_magic_offsets};
pub use repack::repack_appdir;
