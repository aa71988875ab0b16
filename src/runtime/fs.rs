//! File system operations (read, directory, permissions, capacity).

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::{FsStats, RealRuntime};

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)
            .with_context(|| format!("Failed to read directory {:?}", path))?
            .map(|entry| Ok(entry?.path()))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn file_mode_impl(&self, path: &Path) -> Result<u32> {
        let metadata =
            fs::metadata(path).with_context(|| format!("Failed to stat {:?}", path))?;
        Ok(metadata.permissions().mode() & 0o7777)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn set_permissions_impl(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions on {:?}", path))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn fs_stats_impl(&self, path: &Path) -> Result<FsStats> {
        let stats = nix::sys::statvfs::statvfs(path)
            .with_context(|| format!("Failed to query filesystem of {:?}", path))?;

        #[allow(clippy::unnecessary_cast)]
        Ok(FsStats {
            free_bytes: stats.blocks_available() as u64 * stats.fragment_size() as u64,
            free_inodes: stats.files_available() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_file_operations() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let file = dir.path().join("zz-update-grub");

        std::fs::write(&file, "#!/bin/sh\n").unwrap();
        assert!(runtime.exists(&file));
        assert_eq!(runtime.read_to_string(&file).unwrap(), "#!/bin/sh\n");

        runtime.set_permissions(&file, 0o755).unwrap();
        assert_eq!(runtime.file_mode(&file).unwrap(), 0o755);
        runtime.set_permissions(&file, 0o644).unwrap();
        assert_eq!(runtime.file_mode(&file).unwrap(), 0o644);

        let entries = runtime.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![file.clone()]);

        runtime.remove_file(&file).unwrap();
        assert!(!runtime.exists(&file));
        assert!(runtime.remove_file(&file).is_err());
    }

    #[test]
    fn test_real_runtime_fs_stats() {
        let dir = tempdir().unwrap();
        let stats = RealRuntime.fs_stats(dir.path()).unwrap();
        // A writable temp dir has room for at least one more file
        assert!(stats.free_bytes > 0);
    }
}
