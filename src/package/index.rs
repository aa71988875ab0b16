//! Typed index of installed kernel packages.
//!
//! Built once per run from the package database query; maps each release
//! (version plus optional flavor) to the package names carrying it.

use std::collections::BTreeMap;

use serde::Serialize;

use super::record::{PackageRecord, PackageStatus};
use crate::release::{Release, ReleaseSet};

/// Name prefixes of packages that contain a bootable kernel image.
pub const IMAGE_PREFIXES: &[&str] = &[
    "linux-image-unsigned-",
    "linux-signed-image-",
    "linux-image-",
];

/// Return the release of a kernel image package, None for anything else
/// (modules, headers, meta-packages).
pub fn image_release(name: &str) -> Option<Release> {
    IMAGE_PREFIXES
        .iter()
        .filter_map(|prefix| name.strip_prefix(prefix))
        .find_map(Release::parse)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelPackage {
    pub name: String,
    pub status: PackageStatus,
}

#[derive(Debug, Default, Serialize)]
pub struct PackageIndex {
    #[serde(serialize_with = "serialize_by_release")]
    by_release: BTreeMap<Release, Vec<KernelPackage>>,
    /// Installed packages without a release suffix, e.g. `linux-image-generic`
    meta: Vec<PackageRecord>,
}

fn serialize_by_release<S: serde::Serializer>(
    map: &BTreeMap<Release, Vec<KernelPackage>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(map.iter().map(|(k, v)| (k.to_string(), v)))
}

impl PackageIndex {
    pub fn from_records(records: Vec<PackageRecord>) -> Self {
        let mut index = PackageIndex::default();
        for record in records {
            match Release::from_package_name(&record.name) {
                Some(release) => index
                    .by_release
                    .entry(release)
                    .or_default()
                    .push(KernelPackage {
                        name: record.name,
                        status: record.status,
                    }),
                None if record.status.is_installed() => index.meta.push(record),
                None => {}
            }
        }
        for packages in index.by_release.values_mut() {
            packages.sort_by(|a, b| a.name.cmp(&b.name));
        }
        index
    }

    /// Packages whose name ends in exactly this release.
    pub fn packages(&self, release: &Release) -> &[KernelPackage] {
        self.by_release
            .get(release)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Installed packages belonging to a release: exact matches plus the
    /// shared packages (flavor-less or `common`) of the same version.
    pub fn candidates_for(&self, release: &Release) -> Vec<&KernelPackage> {
        let mut candidates: Vec<&KernelPackage> = self.packages(release).iter().collect();
        if !release.is_shared() {
            candidates.extend(self.shared_packages(release.version()));
        }
        candidates
            .into_iter()
            .filter(|p| p.status.is_installed())
            .collect()
    }

    fn shared_packages<'a>(&'a self, version: &str) -> impl Iterator<Item = &'a KernelPackage> {
        self.by_release
            .iter()
            .filter(move |(release, _)| release.is_shared() && release.version() == version)
            .flat_map(|(_, packages)| packages.iter())
    }

    /// Releases with an installed kernel image.
    pub fn installed_releases(&self) -> ReleaseSet {
        self.by_release
            .iter()
            .filter(|(_, packages)| {
                packages
                    .iter()
                    .any(|p| p.status.is_installed() && image_release(&p.name).is_some())
            })
            .map(|(release, _)| release.clone())
            .collect()
    }

    /// Releases the installed meta-packages depend on, i.e. the newest
    /// kernel of each flavor the system tracks.
    pub fn latest_releases(&self) -> ReleaseSet {
        self.meta
            .iter()
            .flat_map(|record| record.depends.iter())
            .filter_map(|name| image_release(name))
            .collect()
    }

    /// Releases whose image package was installed manually.
    pub fn manual_releases(&self, manual_packages: &[String]) -> ReleaseSet {
        manual_packages
            .iter()
            .filter_map(|name| image_release(name))
            .collect::<ReleaseSet>()
            .intersection(&self.installed_releases())
    }

    /// Releases with any held package, either listed by the package manager
    /// or marked held in the database. A held shared package holds every
    /// installed release of its version.
    pub fn held_releases(&self, held_packages: &[String]) -> ReleaseSet {
        let installed = self.installed_releases();
        let mut held = Vec::new();
        for (release, packages) in &self.by_release {
            let is_held = packages
                .iter()
                .any(|p| p.status.is_held() || held_packages.contains(&p.name));
            if !is_held {
                continue;
            }
            if !release.is_shared() {
                held.push(release.clone());
            } else {
                held.extend(
                    installed
                        .iter()
                        .filter(|r| r.version() == release.version())
                        .cloned(),
                );
            }
        }
        held.into_iter().collect::<ReleaseSet>().intersection(&installed)
    }

    /// Packages that serve no installed kernel: leftover configuration
    /// (`rc`), modules or headers of releases whose image is gone, and
    /// shared packages of versions no installed release uses.
    ///
    /// Packages of `protected` releases and held packages are never returned.
    pub fn invalid_packages(&self, protected: &ReleaseSet) -> Vec<String> {
        let installed = self.installed_releases();
        let same_version = |set: &ReleaseSet, release: &Release| {
            set.iter().any(|r| r.version() == release.version())
        };
        let mut invalid = Vec::new();

        for (release, packages) in &self.by_release {
            let guarded = protected.contains(release)
                || (release.is_shared() && same_version(protected, release));
            if guarded {
                continue;
            }

            let orphaned = if release.is_shared() {
                !same_version(&installed, release)
            } else {
                !installed.contains(release)
            };

            for package in packages {
                if package.status.is_held() {
                    continue;
                }
                if package.status.is_config_only()
                    || (orphaned && package.status.is_installed())
                {
                    invalid.push(package.name.clone());
                }
            }
        }
        invalid.sort();
        invalid
    }

    /// Installed packages in a half-installed or half-configured state.
    pub fn broken_packages(&self) -> Vec<(&Release, &KernelPackage)> {
        self.by_release
            .iter()
            .flat_map(|(release, packages)| packages.iter().map(move |p| (release, p)))
            .filter(|(_, p)| p.status.is_broken())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_release.is_empty()
    }
}
