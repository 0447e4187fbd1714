//! Architecture validation.
//!
//! Two checks, both skippable with `--skip-validate`: the overlaid AppDir
//! must actually carry aarch64 binaries (a bad payload would otherwise
//! surface only when a user runs the result on real hardware), and the
//! repacked container must report aarch64 via `file`.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;
use walkdir::WalkDir;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const EM_X86_64: u16 = 62;
const EM_AARCH64: u16 = 183;

/// Machine field of an ELF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfMachine {
    Aarch64,
    X86_64,
    Other(u16),
}

/// Peek the `e_machine` field of a file's ELF header.
///
/// Returns `None` for anything that is not an ELF file (scripts, icons,
/// data). The ident's data-encoding byte selects endianness for the
/// 16-bit machine field at offset 18.
pub fn elf_machine(path: &Path) -> Result<Option<ElfMachine>> {
    let mut file =
        File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut header = [0u8; 20];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .with_context(|| format!("reading '{}'", path.display()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled < header.len() || header[..4] != ELF_MAGIC {
        return Ok(None);
    }

    let machine = match header[5] {
        2 => u16::from_be_bytes([header[18], header[19]]),
        _ => u16::from_le_bytes([header[18], header[19]]),
    };
    Ok(Some(match machine {
        EM_AARCH64 => ElfMachine::Aarch64,
        EM_X86_64 => ElfMachine::X86_64,
        other => ElfMachine::Other(other),
    }))
}

/// Check that the overlaid AppDir carries aarch64 binaries and no
/// leftover x86_64 ones.
///
/// An x86_64 ELF surviving the overlay means the payload did not cover
/// the application binary it was supposed to replace; that is fatal and
/// the error names the file.
pub fn check_appdir_arch(appdir: &Path) -> Result<()> {
    let mut aarch64_seen = false;

    for entry in WalkDir::new(appdir) {
        let entry = entry
            .with_context(|| format!("walking AppDir '{}'", appdir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match elf_machine(entry.path())? {
            Some(ElfMachine::Aarch64) => aarch64_seen = true,
            Some(ElfMachine::X86_64) => bail!(
                "x86_64 binary left in AppDir after overlay: '{}'",
                entry.path().display()
            ),
            _ => {}
        }
    }

    if !aarch64_seen {
        bail!(
            "overlay produced no aarch64 binaries under '{}'",
            appdir.display()
        );
    }
    Ok(())
}

/// Check the rebuilt container's reported architecture via `file`.
pub fn check_output_arch(output: &Path) -> Result<()> {
    let result = Command::new("file")
        .arg("-b")
        .arg(output)
        .output()
        .with_context(|| format!("running file for '{}'", output.display()))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        bail!(
            "file failed inspecting '{}': {}",
            output.display(),
            stderr.trim()
        );
    }

    let description = String::from_utf8_lossy(&result.stdout);
    if !description.to_ascii_lowercase().contains("aarch64") {
        bail!(
            "rebuilt AppImage '{}' does not report aarch64: {}",
            output.display(),
            description.trim()
        );
    }
    Ok(())
}
