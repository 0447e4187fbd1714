//! ARM64 payload extraction and AppDir overlay.
//!
//! The upstream ARM64 payload ships as a tarball. It is unpacked into a
//! scratch directory and its contents are copied over the extracted
//! AppDir, file by file, overwriting the x86_64 payload while the rest of
//! the application shell (desktop entry, icons, AppRun wiring) stays in
//! place.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::fsutil::recreate_dir;

/// Unpack `tarball` into `dest` and return the overlay source root.
///
/// Compression is chosen by file name: gzip (`.tar.gz`/`.tgz`), zstd
/// (`.tar.zst`), or none (`.tar`). Tarballs commonly wrap everything in a
/// single top-level directory; when `dest` ends up holding exactly one
/// directory and nothing else, that directory is the root.
pub fn extract_payload(tarball: &Path, dest: &Path) -> Result<PathBuf> {
    recreate_dir(dest)?;

    let name = tarball
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let file =
        File::open(tarball).with_context(|| format!("opening payload '{}'", tarball.display()))?;
    let reader = BufReader::new(file);

    let decompressed: Box<dyn Read> = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Box::new(GzDecoder::new(reader))
    } else if name.ends_with(".tar.zst") {
        Box::new(
            zstd::stream::read::Decoder::new(reader)
                .with_context(|| format!("opening zstd stream in '{}'", tarball.display()))?,
        )
    } else if name.ends_with(".tar") {
        Box::new(reader)
    } else {
        bail!("unsupported payload archive format: '{}'", name);
    };

    let mut archive = tar::Archive::new(decompressed);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .with_context(|| format!("unpacking payload '{}'", tarball.display()))?;

    payload_root(dest)
}

fn payload_root(dest: &Path) -> Result<PathBuf> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dest)
        .with_context(|| format!("reading unpacked payload '{}'", dest.display()))?
    {
        entries.push(entry?);
    }

    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        Ok(entries[0].path())
    } else {
        Ok(dest.to_path_buf())
    }
}

/// Recursively copy `src` over `dst`, overwriting what is already there.
///
/// Symlinks are preserved, not followed. A directory in `dst` shadowed by
/// a regular file in `src` is replaced. Returns the number of files and
/// symlinks written, for progress reporting.
pub fn overlay_dir(src: &Path, dst: &Path) -> Result<u64> {
    if !dst.exists() {
        fs::create_dir_all(dst)
            .with_context(|| format!("creating directory '{}'", dst.display()))?;
    }

    let mut written = 0u64;
    for entry in
        fs::read_dir(src).with_context(|| format!("reading directory '{}'", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path)?;
            remove_existing(&dst_path)?;
            std::os::unix::fs::symlink(&target, &dst_path)
                .with_context(|| format!("creating symlink '{}'", dst_path.display()))?;
            written += 1;
        } else if file_type.is_dir() {
            if dst_path.is_file() || dst_path.is_symlink() {
                fs::remove_file(&dst_path)
                    .with_context(|| format!("removing '{}'", dst_path.display()))?;
            }
            written += overlay_dir(&src_path, &dst_path)?;
        } else {
            if dst_path.is_dir() {
                fs::remove_dir_all(&dst_path)
                    .with_context(|| format!("removing directory '{}'", dst_path.display()))?;
            }
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("copying '{}'", src_path.display()))?;
            written += 1;
        }
    }

    Ok(written)
}

fn remove_existing(path: &Path) -> Result<()> {
    if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
            .with_context(|| format!("removing directory '{}'", path.display()))?;
    } else if path.exists() || path.is_symlink() {
        fs::remove_file(path).with_context(|| format!("removing '{}'", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn build_payload_tree(base: &Path) -> PathBuf {
        let tree = base.join("editor-arm64");
        fs::create_dir_all(tree.join("usr/bin")).expect("create payload dirs");
        fs::write(tree.join("usr/bin/editor"), b"arm64-binary").expect("write payload binary");
        fs::write(tree.join("version.txt"), b"2.4.1").expect("write version file");
        tree
    }

    fn tar_gz_payload(temp: &TempDir) -> PathBuf {
        let tree = build_payload_tree(temp.path());
        let tarball = temp.path().join("editor-arm64.tar.gz");
        let file = File::create(&tarball).expect("create tarball");
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all("editor-arm64", &tree)
            .expect("append payload tree");
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip");
        tarball
    }

    #[test]
    fn extracts_tar_gz_and_strips_single_wrapping_dir() {
        let temp = TempDir::new().expect("create temp dir");
        let tarball = tar_gz_payload(&temp);

        let dest = temp.path().join("payload");
        let root = extract_payload(&tarball, &dest).expect("extract payload");

        assert_eq!(root, dest.join("editor-arm64"));
        assert_eq!(
            fs::read(root.join("usr/bin/editor")).expect("read extracted binary"),
            b"arm64-binary"
        );
    }

    #[test]
    fn extracts_plain_tar_without_wrapping_dir() {
        let temp = TempDir::new().expect("create temp dir");
        let tree = temp.path().join("flat");
        fs::create_dir_all(&tree).expect("create tree");
        fs::write(tree.join("a.txt"), b"a").expect("write a");
        fs::write(tree.join("b.txt"), b"b").expect("write b");

        let tarball = temp.path().join("flat.tar");
        let mut builder = tar::Builder::new(File::create(&tarball).expect("create tar"));
        builder.append_dir_all(".", &tree).expect("append tree");
        builder.finish().expect("finish tar");

        let dest = temp.path().join("payload");
        let root = extract_payload(&tarball, &dest).expect("extract payload");

        // Two files at the top level: no wrapping dir to strip.
        assert_eq!(root, dest);
        assert!(root.join("a.txt").is_file());
        assert!(root.join("b.txt").is_file());
    }

    #[test]
    fn extracts_tar_zst_payload() {
        let temp = TempDir::new().expect("create temp dir");
        let tree = build_payload_tree(temp.path());

        let plain_tar = temp.path().join("payload.tar");
        let mut builder = tar::Builder::new(File::create(&plain_tar).expect("create tar"));
        builder
            .append_dir_all("editor-arm64", &tree)
            .expect("append tree");
        builder.finish().expect("finish tar");

        let tarball = temp.path().join("editor-aarch64.tar.zst");
        zstd::stream::copy_encode(
            File::open(&plain_tar).expect("open tar"),
            File::create(&tarball).expect("create tar.zst"),
            0,
        )
        .expect("zstd encode");

        let dest = temp.path().join("payload");
        let root = extract_payload(&tarball, &dest).expect("extract payload");
        assert!(root.join("usr/bin/editor").is_file());
    }

    #[test]
    fn unknown_archive_extension_is_rejected() {
        let temp = TempDir::new().expect("create temp dir");
        let bogus = temp.path().join("payload.7z");
        fs::write(&bogus, b"not a tarball").expect("write bogus payload");

        let err = extract_payload(&bogus, &temp.path().join("payload"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("unsupported payload archive format"), "got: {err}");
    }

    #[test]
    fn overlay_overwrites_files_and_counts_them() {
        let temp = TempDir::new().expect("create temp dir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("usr/bin")).expect("create src");
        fs::create_dir_all(dst.join("usr/bin")).expect("create dst");
        fs::write(src.join("usr/bin/editor"), b"arm64").expect("write src binary");
        fs::write(dst.join("usr/bin/editor"), b"x86_64").expect("write dst binary");
        fs::write(src.join("usr/bin/helper"), b"new").expect("write src helper");

        let written = overlay_dir(&src, &dst).expect("overlay");

        assert_eq!(written, 2);
        assert_eq!(
            fs::read(dst.join("usr/bin/editor")).expect("read overlaid binary"),
            b"arm64"
        );
        assert_eq!(
            fs::read(dst.join("usr/bin/helper")).expect("read new file"),
            b"new"
        );
    }

    #[test]
    fn overlay_preserves_symlinks_and_replaces_stale_ones() {
        let temp = TempDir::new().expect("create temp dir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).expect("create src");
        fs::create_dir_all(&dst).expect("create dst");
        symlink("usr/bin/editor", src.join("AppRun")).expect("create src symlink");
        symlink("stale-target", dst.join("AppRun")).expect("create stale dst symlink");

        overlay_dir(&src, &dst).expect("overlay");

        let target = fs::read_link(dst.join("AppRun")).expect("read overlaid symlink");
        assert_eq!(target, Path::new("usr/bin/editor"));
    }

    #[test]
    fn overlay_replaces_a_directory_with_a_file() {
        let temp = TempDir::new().expect("create temp dir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).expect("create src");
        fs::create_dir_all(dst.join("resources")).expect("create dst dir");
        fs::write(src.join("resources"), b"now a file").expect("write src file");

        overlay_dir(&src, &dst).expect("overlay");

        assert!(dst.join("resources").is_file());
    }
}
