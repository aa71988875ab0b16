use std::path::PathBuf;
use std::time::Duration;

use crate::boot::BootCapacity;
use crate::chooser::Interface;
use crate::policy::Policy;

/// Where the running kernel reports its release.
pub const DEFAULT_OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";
pub const DEFAULT_BOOT_DIR: &str = "/boot";
pub const DEFAULT_BOOTLOADER: &str = "/usr/sbin/update-grub";

/// Locks held by dpkg and apt while they work.
pub const DEFAULT_LOCK_FILES: &[&str] = &[
    "/var/lib/dpkg/lock-frontend",
    "/var/lib/dpkg/lock",
    "/var/lib/apt/lists/lock",
    "/var/cache/apt/archives/lock",
];

/// Hooks kernel packages run to regenerate the GRUB configuration.
pub const DEFAULT_GRUB_HOOKS: &[&str] = &[
    "/etc/kernel/postinst.d/zz-update-grub",
    "/etc/kernel/postrm.d/zz-update-grub",
];

/// Seconds between checks of the package manager locks.
pub const LOCK_POLL_SECONDS: u64 = 3;

/// Room kernel postinst/postrm scripts need on /boot to rebuild an initramfs.
pub const MIN_BOOT_FREE_BYTES: u64 = 32 * 1024 * 1024;
pub const MIN_BOOT_FREE_INODES: u64 = 32;

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub policy: Policy,
    /// Requested checklist front end; detected when None
    pub interface: Option<Interface>,
    /// Dump the gathered state as JSON to stderr
    pub debug: bool,
    pub boot_dir: PathBuf,
    pub osrelease_path: PathBuf,
    pub lock_files: Vec<PathBuf>,
    pub grub_hooks: Vec<PathBuf>,
    pub bootloader: PathBuf,
    pub capacity: BootCapacity,
    pub lock_poll_interval: Duration,
}

impl Config {
    pub fn new(policy: Policy, interface: Option<Interface>, debug: bool) -> Self {
        Self {
            policy,
            interface,
            debug,
            boot_dir: PathBuf::from(DEFAULT_BOOT_DIR),
            osrelease_path: PathBuf::from(DEFAULT_OSRELEASE_PATH),
            lock_files: DEFAULT_LOCK_FILES.iter().map(PathBuf::from).collect(),
            grub_hooks: DEFAULT_GRUB_HOOKS.iter().map(PathBuf::from).collect(),
            bootloader: PathBuf::from(DEFAULT_BOOTLOADER),
            capacity: BootCapacity {
                min_free_bytes: MIN_BOOT_FREE_BYTES,
                min_free_inodes: MIN_BOOT_FREE_INODES,
            },
            lock_poll_interval: Duration::from_secs(LOCK_POLL_SECONDS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new(Policy::default(), None, false);
        assert_eq!(config.boot_dir, PathBuf::from("/boot"));
        assert_eq!(config.osrelease_path, PathBuf::from("/proc/sys/kernel/osrelease"));
        assert_eq!(config.lock_files.len(), 4);
        assert!(config.grub_hooks.iter().all(|h| h.ends_with("zz-update-grub")));
        assert_eq!(config.lock_poll_interval, Duration::from_secs(3));
        assert!(config.interface.is_none());
    }
}
