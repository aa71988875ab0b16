//! Translation of selected releases into package names.

use anyhow::{Context, Result};
use log::debug;
use regex::RegexSet;
use serde::Serialize;

use super::selection::Selection;
use crate::package::PackageIndex;
use crate::release::{Release, ReleaseSet, SHARED_FLAVOR};

/// Packages to hand to the package manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PurgePlan {
    /// Releases that contributed at least one package
    pub releases: ReleaseSet,
    /// Packages of the releases being purged
    pub packages: Vec<String>,
    /// Leftover packages of kernels that are no longer installed
    pub invalid: Vec<String>,
}

impl PurgePlan {
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.invalid.is_empty()
    }

    /// Every package to purge, sorted and without duplicates.
    pub fn all_packages(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .packages
            .iter()
            .chain(self.invalid.iter())
            .cloned()
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

/// Pattern matching every package name of a kept release, including the
/// shared packages of its version: `-<version>(-<flavor>|-common(-...)*)?$`.
pub fn kept_pattern(release: &Release) -> String {
    let version = regex::escape(release.version());
    let shared = format!("-{}(-[^-]+)*", SHARED_FLAVOR);
    match release.flavor() {
        Some(flavor) if !release.is_shared() => {
            format!("-{}(-{}|{})?$", version, regex::escape(flavor), shared)
        }
        _ => format!("-{}({})?$", version, shared),
    }
}

/// Build the package list for a selection.
///
/// Candidates of a purged release are its exact-suffix packages plus the
/// shared packages of its version; any candidate that also matches a kept
/// or protected release is left alone, so shared packages such as
/// `linux-headers-<version>` survive while one flavor still needs them.
pub fn build_plan(
    index: &PackageIndex,
    selection: &Selection,
    protected: &ReleaseSet,
    include_invalid: bool,
) -> Result<PurgePlan> {
    let kept = selection.keep.union(protected);
    let guard = RegexSet::new(kept.iter().map(kept_pattern))
        .context("building patterns of kept releases")?;

    let mut plan = PurgePlan::default();
    let mut releases = Vec::new();

    for release in selection.purge.difference(protected).iter() {
        let packages: Vec<String> = index
            .candidates_for(release)
            .into_iter()
            .map(|p| p.name.clone())
            .filter(|name| !guard.is_match(name))
            .collect();

        if packages.is_empty() {
            debug!("No installed packages left for {}", release);
            continue;
        }
        releases.push(release.clone());
        plan.packages.extend(packages);
    }
    plan.releases = releases.into_iter().collect();

    if include_invalid {
        plan.invalid = index
            .invalid_packages(&kept)
            .into_iter()
            .filter(|name| !guard.is_match(name) && !plan.packages.contains(name))
            .collect();
    }

    Ok(plan)
}
