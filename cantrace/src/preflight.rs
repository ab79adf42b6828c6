//! Pre-flight checks for cantrace
//!
//! Validates system requirements before attempting to load the probes.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::cli::Args;

/// Minimum kernel version with BPF ring buffer support
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// Run all pre-flight checks before probe loading
///
/// # Errors
/// Returns the first failed requirement
pub fn run_preflight_checks(args: &Args) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_file_exists(&args.object, "--object")?;
    if !args.is_kernel {
        let binaries =
            [(&args.talker_file, "--talker-file"), (&args.listener_file, "--listener-file")];
        for (file, flag) in binaries {
            if let Some(file) = file {
                check_file_exists(file, flag)?;
            }
        }
    }
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: cantrace requires root privileges to load eBPF programs.\n\n\
         Run with: sudo cantrace ..."
    );
}

/// Check if the kernel version is sufficient for ring buffers
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 6.1.0-arch1-1 ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");
    let Some((major, minor)) = parse_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {major}.{minor} is too old.\n\n\
             cantrace requires Linux {}.{} or newer for eBPF ring buffer support.\n\
             Current kernel: {release}",
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }

    Ok(())
}

/// `"5.15.0-generic"` → `(5, 15)`
fn parse_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts.next()?.chars().take_while(char::is_ascii_digit).collect();
    Some((major, minor.parse().ok()?))
}

/// Check that a file passed on the command line exists and is a regular file
fn check_file_exists(path: &Path, flag: &str) -> Result<()> {
    if !path.exists() {
        bail!(
            "File not found: {}\n\n\
             Make sure the path given to {flag} is correct.",
            path.display()
        );
    }
    if !path.is_file() {
        bail!(
            "Not a file: {}\n\n\
             {flag} must point to a file, not a directory.",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_version_check() {
        // Don't assert success since tests might run on an old kernel
        let _ = check_kernel_version();
    }

    #[test]
    fn test_parse_release() {
        assert_eq!(parse_release("5.15.0-generic"), Some((5, 15)));
        assert_eq!(parse_release("6.1-rc3"), Some((6, 1)));
        assert_eq!(parse_release("unknown"), None);
    }

    #[test]
    fn test_file_not_found() {
        let err = check_file_exists(Path::new("/nonexistent/bpf.o"), "--object").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_file_exists(dir.path(), "--talker-file").unwrap_err();
        assert!(err.to_string().contains("--talker-file must point to a file"));
    }
}
