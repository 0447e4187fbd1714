//! Squashfs offset discovery inside an AppImage.
//!
//! The squashfs superblock starts with the 4-byte magic `hsqs`. The scan
//! collects every occurrence of the magic in the container; a candidate
//! offset counts only once `unsquashfs -s` can actually read a superblock
//! there, since the magic bytes can occur by chance inside the ELF runtime
//! or embedded resources. First offset that validates wins.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

const SQUASHFS_MAGIC: &[u8; 4] = b"hsqs";

/// Scan read size. The carry keeps magic occurrences that straddle a
/// chunk boundary visible.
const SCAN_CHUNK: usize = 1024 * 1024;
const SCAN_CARRY: usize = SQUASHFS_MAGIC.len() - 1;

/// Upper bound on candidates handed to trial validation.
const MAX_CANDIDATES: usize = 64;

/// Collect byte offsets of every squashfs magic occurrence in `image`.
///
/// Offsets are returned in ascending order, capped at [`MAX_CANDIDATES`].
pub fn scan_magic_offsets(image: &Path) -> Result<Vec<u64>> {
    let mut file =
        File::open(image).with_context(|| format!("opening '{}' for scan", image.display()))?;

    let mut offsets = Vec::new();
    let mut window: Vec<u8> = Vec::with_capacity(SCAN_CHUNK + SCAN_CARRY);
    let mut chunk = vec![0u8; SCAN_CHUNK];
    // File offset of window[0].
    let mut base: u64 = 0;

    loop {
        let n = file
            .read(&mut chunk)
            .with_context(|| format!("reading '{}'", image.display()))?;
        if n == 0 {
            break;
        }
        window.extend_from_slice(&chunk[..n]);

        let mut search_from = 0;
        while let Some(pos) = find_magic(&window[search_from..]) {
            offsets.push(base + (search_from + pos) as u64);
            if offsets.len() >= MAX_CANDIDATES {
                return Ok(offsets);
            }
            search_from += pos + 1;
        }

        let keep = window.len().min(SCAN_CARRY);
        base += (window.len() - keep) as u64;
        window.drain(..window.len() - keep);
    }

    Ok(offsets)
}

fn find_magic(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(SQUASHFS_MAGIC.len())
        .position(|w| w == SQUASHFS_MAGIC)
}

/// Trial-validate a candidate offset by reading the superblock with
/// `unsquashfs -s`.
fn offset_has_superblock(image: &Path, offset: u64) -> bool {
    Command::new("unsquashfs")
        .arg("-s")
        .arg("-o")
        .arg(offset.to_string())
        .arg(image)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Locate the embedded squashfs image in `image`.
///
/// No magic occurrence at all, or no candidate surviving trial
/// validation, is fatal: the file is not a type-2 AppImage we can unpack.
pub fn find_squashfs_offset(image: &Path) -> Result<u64> {
    let candidates = scan_magic_offsets(image)?;
    if candidates.is_empty() {
        bail!(
            "no squashfs signature found in '{}'; not a type-2 AppImage?",
            image.display()
        );
    }

    for &offset in &candidates {
        if offset_has_superblock(image, offset) {
            return Ok(offset);
        }
    }

    bail!(
        "none of {} squashfs signature candidate(s) in '{}' validated with unsquashfs",
        candidates.len(),
        image.display()
    )
}
