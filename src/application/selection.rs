//! Release selection: which installed kernels to keep and which to purge.
//!
//! Pure functions over [`ReleaseSet`]s; nothing here touches the system.

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;

use crate::chooser::ChecklistItem;
use crate::error::PurgeError;
use crate::policy::Policy;
use crate::release::{Release, ReleaseSet};

/// Release sets describing the system, gathered once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemReleases {
    pub installed: ReleaseSet,
    /// Releases the installed meta-packages depend on
    pub latest: ReleaseSet,
    pub manual: ReleaseSet,
    pub hold: ReleaseSet,
    /// The running kernel
    #[serde(serialize_with = "serialize_display")]
    pub current: Release,
}

fn serialize_display<S: serde::Serializer>(release: &Release, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(release)
}

impl SystemReleases {
    /// Releases that no policy may purge: the running kernel and held ones.
    pub fn protected(&self) -> ReleaseSet {
        ReleaseSet::single(self.current.clone()).union(&self.hold)
    }
}

/// Partition of the installed releases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub keep: ReleaseSet,
    pub purge: ReleaseSet,
}

impl Selection {
    fn from_keep(installed: &ReleaseSet, keep: ReleaseSet) -> Self {
        let keep = keep.intersection(installed);
        let purge = installed.difference(&keep);
        Self { keep, purge }
    }
}

/// Per-release annotations shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Markers {
    pub latest: bool,
    pub held: bool,
    pub manual: bool,
    pub current: bool,
}

impl Markers {
    pub fn of(system: &SystemReleases, release: &Release) -> Self {
        Self {
            latest: system.latest.contains(release),
            held: system.hold.contains(release),
            manual: system.manual.contains(release),
            current: &system.current == release,
        }
    }

    /// Comma-separated marker names, empty when no marker applies.
    ///
    /// The running kernel is never a checklist row, so `current` has no label.
    pub fn label(&self) -> String {
        [
            (self.latest, "latest"),
            (self.held, "hold"),
            (self.manual, "manual"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Keep each latest release plus the `count` installed releases of the
/// same flavor right before it.
pub fn keep_latest(installed: &ReleaseSet, latest: &ReleaseSet, count: usize) -> ReleaseSet {
    let mut keep = Vec::new();
    for anchor in latest {
        let same_flavor = installed.with_flavor(anchor.flavor());
        if same_flavor.contains(anchor) {
            keep.push(anchor.clone());
        }
        keep.extend(
            same_flavor
                .iter()
                .rev()
                .filter(|r| *r < anchor)
                .take(count)
                .cloned(),
        );
    }
    keep.into_iter().collect()
}

/// Compute the releases to keep under a policy.
pub fn releases_to_keep(system: &SystemReleases, policy: &Policy) -> ReleaseSet {
    let protected = system.protected();

    let keep = if policy.manual {
        system
            .installed
            .difference(&system.manual)
            .union(&protected)
    } else if let Some(count) = policy.keep {
        let mut keep = keep_latest(&system.installed, &system.latest, count).union(&protected);
        if policy.auto_only {
            keep = keep.union(&system.manual);
        }
        keep
    } else {
        system.installed.clone()
    };

    keep.intersection(&system.installed)
}

/// Partition the installed releases by policy.
pub fn select(system: &SystemReleases, policy: &Policy) -> Selection {
    let selection = Selection::from_keep(&system.installed, releases_to_keep(system, policy));
    debug!(
        "Keeping [{}], purging [{}]",
        selection.keep, selection.purge
    );
    selection
}

/// Checklist rows for interactive choosing: every installed release except
/// the running one, pre-checked when the policy would purge it.
pub fn checklist(system: &SystemReleases, keep: &ReleaseSet) -> Vec<ChecklistItem> {
    system
        .installed
        .iter()
        .filter(|release| **release != system.current)
        .map(|release| ChecklistItem {
            tag: release.to_string(),
            label: Markers::of(system, release).label(),
            selected: !keep.contains(release),
        })
        .collect()
}

/// Turn the user's checklist answer into the selection.
///
/// The answer replaces the policy outright. Tags that are not choosable
/// (unknown, the running kernel) are ignored; held releases are dropped with
/// a warning because the package manager refuses to touch them.
pub fn apply_choice(system: &SystemReleases, chosen: &[String]) -> Result<Selection> {
    if chosen.is_empty() {
        return Err(PurgeError::NothingChosen.into());
    }

    let choosable = system
        .installed
        .difference(&ReleaseSet::single(system.current.clone()));
    let picked: ReleaseSet = chosen
        .iter()
        .filter_map(|tag| Release::parse(tag))
        .collect::<ReleaseSet>()
        .intersection(&choosable);

    let held = picked.intersection(&system.hold);
    if !held.is_empty() {
        warn!("Not purging held release(s): {}", held);
    }
    let purge = picked.difference(&held);

    Ok(Selection {
        keep: system.installed.difference(&purge),
        purge,
    })
}
