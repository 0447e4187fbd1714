//! Preflight checks for the rebuild pipeline.
//!
//! Validates that the host system has the required external tools before
//! any network or extraction work starts. This prevents cryptic errors
//! halfway through a rebuild.
//!
//! # Example
//!
//! ```rust
//! use appimage_rebuilder::preflight::{command_exists, check_required_tools};
//!
//! // Check a single command
//! if !command_exists("unsquashfs") {
//!     println!("squashfs-tools not installed");
//! }
//!
//! // Check multiple tools
//! let tools = &[("unsquashfs", "squashfs-tools"), ("file", "file")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

/// Check if a command exists on the host system.
///
/// Resolves the command against PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Required host tools for rebuilding AppImages.
///
/// Each tuple is (command_name, package_name). `mksquashfs` is not invoked
/// directly but appimagetool shells out to it when repacking.
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("unsquashfs", "squashfs-tools"),
    ("mksquashfs", "squashfs-tools"),
    ("appimagetool", "appimagetool"),
    ("file", "file"),
];

/// Check that specific tools are available.
///
/// # Arguments
///
/// * `tools` - Slice of (command, package) tuples
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check that all tools the rebuild pipeline shells out to are available.
///
/// This checks all tools in [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'ls' should exist on any Unix system
        assert!(command_exists("ls"));
        // Random garbage should not exist
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        // These should exist on any Unix system
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_reports_every_missing_tool() {
        let tools = &[
            ("nonexistent_command_xyz", "fake-package"),
            ("another_missing_tool_abc", "other-package"),
        ];
        let err = check_required_tools(tools).unwrap_err().to_string();
        assert!(err.contains("nonexistent_command_xyz"));
        assert!(err.contains("another_missing_tool_abc"));
    }
}
