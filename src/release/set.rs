//! Normalized sets of kernel releases.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use serde::{Serialize, Serializer};

use super::Release;

/// An ordered, duplicate-free set of releases, ascending by version then flavor.
///
/// All operations return new sets; a `ReleaseSet` is never mutated after
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSet {
    releases: BTreeSet<Release>,
}

impl ReleaseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from free-form lines, one release per line.
    ///
    /// Blank lines are ignored and lines that are not kernel releases are
    /// skipped.
    pub fn parse_lines(text: &str) -> Self {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let release = Release::parse(line);
                if release.is_none() {
                    debug!("Ignoring non-release entry {:?}", line);
                }
                release
            })
            .collect()
    }

    pub fn single(release: Release) -> Self {
        std::iter::once(release).collect()
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn contains(&self, release: &Release) -> bool {
        self.releases.contains(release)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Release> {
        self.releases.iter()
    }

    pub fn union(&self, other: &ReleaseSet) -> ReleaseSet {
        self.releases.union(&other.releases).cloned().collect()
    }

    pub fn difference(&self, other: &ReleaseSet) -> ReleaseSet {
        self.releases.difference(&other.releases).cloned().collect()
    }

    pub fn intersection(&self, other: &ReleaseSet) -> ReleaseSet {
        self.releases
            .intersection(&other.releases)
            .cloned()
            .collect()
    }

    pub fn is_subset(&self, other: &ReleaseSet) -> bool {
        self.releases.is_subset(&other.releases)
    }

    pub fn is_disjoint(&self, other: &ReleaseSet) -> bool {
        self.releases.is_disjoint(&other.releases)
    }

    /// Releases with exactly the given flavor.
    pub fn with_flavor(&self, flavor: Option<&str>) -> ReleaseSet {
        self.releases
            .iter()
            .filter(|r| r.flavor() == flavor)
            .cloned()
            .collect()
    }

    /// Distinct flavors present in the set, in order of first appearance.
    pub fn flavors(&self) -> Vec<Option<&str>> {
        let mut flavors: Vec<Option<&str>> = Vec::new();
        for release in &self.releases {
            if !flavors.contains(&release.flavor()) {
                flavors.push(release.flavor());
            }
        }
        flavors
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.releases.iter().map(Release::to_string).collect()
    }
}

impl FromIterator<Release> for ReleaseSet {
    fn from_iter<I: IntoIterator<Item = Release>>(iter: I) -> Self {
        Self {
            releases: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ReleaseSet {
    type Item = Release;
    type IntoIter = std::collections::btree_set::IntoIter<Release>;

    fn into_iter(self) -> Self::IntoIter {
        self.releases.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReleaseSet {
    type Item = &'a Release;
    type IntoIter = std::collections::btree_set::Iter<'a, Release>;

    fn into_iter(self) -> Self::IntoIter {
        self.releases.iter()
    }
}

impl fmt::Display for ReleaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(" "))
    }
}

impl Serialize for ReleaseSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.releases.iter().map(Release::to_string))
    }
}
