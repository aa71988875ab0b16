//! /boot maintenance: stale kernel files, free space, bootloader hooks.

mod hooks;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use log::{debug, info};

use crate::release::{Release, ReleaseSet};
use crate::runtime::{FsStats, Runtime};

pub use hooks::{HookGuard, regenerate_bootloader};

/// Names of per-release files kernel packages and initramfs tools put in /boot.
const BOOT_FILE_PATTERNS: &[&str] = &[
    "vmlinuz-*",
    "initrd.img-*",
    "System.map-*",
    "config-*",
    "abi-*",
    "retpoline-*",
];

/// Backup suffixes left by update-initramfs and dpkg.
const BACKUP_SUFFIXES: &[&str] = &[".old-dkms", ".dpkg-bak", ".efi.signed", ".old", ".bak"];

/// Release a /boot file belongs to, if its name follows the kernel file scheme.
pub fn boot_file_release(file_name: &str) -> Option<Release> {
    let pattern = BOOT_FILE_PATTERNS
        .iter()
        .find(|p| Pattern::new(p).is_ok_and(|pattern| pattern.matches(file_name)))?;
    let prefix = pattern.trim_end_matches('*');
    let mut rest = file_name.strip_prefix(prefix)?;
    for suffix in BACKUP_SUFFIXES {
        if let Some(stripped) = rest.strip_suffix(suffix) {
            rest = stripped;
            break;
        }
    }
    Release::parse(rest)
}

/// Files in `boot_dir` belonging to releases not in `wanted`.
pub fn stale_boot_files<R: Runtime>(
    runtime: &R,
    boot_dir: &Path,
    wanted: &ReleaseSet,
) -> Result<Vec<PathBuf>> {
    let mut stale: Vec<PathBuf> = runtime
        .read_dir(boot_dir)
        .with_context(|| format!("listing {:?}", boot_dir))?
        .into_iter()
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                return false;
            };
            match boot_file_release(name) {
                Some(release) => !wanted.contains(&release),
                None => false,
            }
        })
        .collect();
    stale.sort();
    debug!("Found {} stale file(s) in {:?}", stale.len(), boot_dir);
    Ok(stale)
}

/// Remove stale boot files. Returns how many were (or would be) removed.
#[tracing::instrument(skip(runtime, files))]
pub fn clear_boot<R: Runtime>(runtime: &R, files: &[PathBuf], simulate: bool) -> Result<usize> {
    for file in files {
        if simulate {
            println!("Would remove {}", file.display());
        } else {
            runtime.remove_file(file)?;
            println!("Removed {}", file.display());
        }
    }
    if !files.is_empty() {
        info!("Cleared {} stale file(s) from /boot", files.len());
    }
    Ok(files.len())
}

/// Minimum free room on /boot for kernel maintenance scripts to work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootCapacity {
    pub min_free_bytes: u64,
    pub min_free_inodes: u64,
}

impl BootCapacity {
    /// Current stats of `boot_dir` when they are below the minimum, None when
    /// there is enough room.
    pub fn shortage<R: Runtime>(&self, runtime: &R, boot_dir: &Path) -> Result<Option<FsStats>> {
        let stats = runtime.fs_stats(boot_dir)?;
        debug!(
            "{:?} has {} bytes and {} inodes free",
            boot_dir, stats.free_bytes, stats.free_inodes
        );
        if stats.free_bytes < self.min_free_bytes || stats.free_inodes < self.min_free_inodes {
            Ok(Some(stats))
        } else {
            Ok(None)
        }
    }
}
