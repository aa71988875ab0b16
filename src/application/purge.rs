//! Purge action - gathers the release sets describing the system.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use super::selection::SystemReleases;
use crate::package::{PackageIndex, PackageManager};
use crate::release::Release;
use crate::runtime::Runtime;

/// Collects live system state for one run.
pub struct PurgeAction<'a, R: Runtime, P: PackageManager> {
    runtime: &'a R,
    packages: &'a P,
    osrelease_path: PathBuf,
}

impl<'a, R: Runtime, P: PackageManager> PurgeAction<'a, R, P> {
    pub fn new(runtime: &'a R, packages: &'a P, osrelease_path: &Path) -> Self {
        Self {
            runtime,
            packages,
            osrelease_path: osrelease_path.to_path_buf(),
        }
    }

    /// The running kernel release.
    pub fn current_release(&self) -> Result<Release> {
        let text = self
            .runtime
            .read_to_string(&self.osrelease_path)
            .context("reading the running kernel release")?;
        text.trim()
            .parse()
            .with_context(|| format!("parsing running kernel release from {:?}", self.osrelease_path))
    }

    /// Query the package database and derive all release sets.
    #[tracing::instrument(skip(self))]
    pub fn survey(&self) -> Result<(PackageIndex, SystemReleases)> {
        let current = self.current_release()?;
        let index = PackageIndex::from_records(self.packages.query()?);
        let manual = self.packages.manual_packages()?;
        let held = self.packages.held_packages()?;

        let system = SystemReleases {
            installed: index.installed_releases(),
            latest: index.latest_releases(),
            manual: index.manual_releases(&manual),
            hold: index.held_releases(&held),
            current,
        };
        debug!("Installed releases: {}", system.installed);
        debug!(
            "Latest releases: {} (flavors {:?})",
            system.latest,
            system.latest.flavors()
        );
        debug!("Manual releases: {}", system.manual);
        debug!("Held releases: {}", system.hold);
        debug!("Current release: {}", system.current);

        Ok((index, system))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{MockPackageManager, parse_query_output};
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    const OSRELEASE: &str = "/proc/sys/kernel/osrelease";

    fn runtime_with_current(current: &'static str) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from(OSRELEASE)))
            .returning(move |_| Ok(format!("{}\n", current)));
        runtime
    }

    #[test]
    fn test_current_release() {
        let runtime = runtime_with_current("4.15.0-42-generic");
        let pm = MockPackageManager::new();
        let action = PurgeAction::new(&runtime, &pm, Path::new(OSRELEASE));

        assert_eq!(
            action.current_release().unwrap(),
            "4.15.0-42-generic".parse::<Release>().unwrap()
        );
    }

    #[test]
    fn test_current_release_self_built() {
        let runtime = runtime_with_current("6.6.0+");
        let pm = MockPackageManager::new();
        let action = PurgeAction::new(&runtime, &pm, Path::new(OSRELEASE));

        let current = action.current_release().unwrap();
        assert_eq!(current.version(), "6.6.0+");
        assert_eq!(current.flavor(), None);
    }

    #[test]
    fn test_current_release_unparsable() {
        let runtime = runtime_with_current("weird");
        let pm = MockPackageManager::new();
        let action = PurgeAction::new(&runtime, &pm, Path::new(OSRELEASE));

        assert!(action.current_release().is_err());
    }

    #[test]
    fn test_survey() {
        let runtime = runtime_with_current("4.15.0-20-generic");
        let mut pm = MockPackageManager::new();
        pm.expect_query().returning(|| {
            Ok(parse_query_output(
                "ii \tlinux-image-4.15.0-20-generic\t\n\
                 ii \tlinux-image-4.15.0-30-generic\t\n\
                 ii \tlinux-image-4.15.0-42-generic\t\n\
                 ii \tlinux-image-generic\tlinux-image-4.15.0-42-generic\n",
            ))
        });
        pm.expect_manual_packages()
            .returning(|| Ok(vec!["linux-image-4.15.0-30-generic".to_string()]));
        pm.expect_held_packages().returning(|| Ok(vec![]));

        let action = PurgeAction::new(&runtime, &pm, Path::new(OSRELEASE));
        let (index, system) = action.survey().unwrap();

        assert!(!index.is_empty());
        assert_eq!(system.installed.len(), 3);
        assert_eq!(system.latest.to_strings(), vec!["4.15.0-42-generic"]);
        assert_eq!(system.manual.to_strings(), vec!["4.15.0-30-generic"]);
        assert!(system.hold.is_empty());
        assert_eq!(system.current.to_string(), "4.15.0-20-generic");
    }
}
