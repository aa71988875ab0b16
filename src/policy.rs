//! Purge policy and validation of option combinations.

use serde::Serialize;

use crate::error::PurgeError;

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Policy {
    /// Keep this many releases older than the latest of each flavor
    pub keep: Option<usize>,
    /// Keep manually installed releases (only purge automatic ones)
    pub auto_only: bool,
    /// Purge manually installed releases, keep automatic ones
    pub manual: bool,
    /// Let the user pick the releases to purge
    pub choose: bool,
    /// Remove stale files of uninstalled kernels from /boot
    pub clear_boot: bool,
    /// Repair broken kernel packages instead of purging by policy
    pub fix: bool,
    pub simulate: bool,
    /// Do not ask for confirmation
    pub yes: bool,
    /// Omit the marker legend from the checklist
    pub no_legend: bool,
    /// Regenerate the bootloader configuration once instead of per package
    pub optimize: bool,
}

impl Policy {
    /// Reject option combinations that make no sense together.
    ///
    /// Runs before anything touches the system.
    pub fn validate(&self) -> Result<(), PurgeError> {
        if self.auto_only && self.keep.is_none() {
            return Err(PurgeError::Usage(
                "--auto-only requires --keep".to_string(),
            ));
        }
        if self.keep.is_some() && self.manual {
            return Err(PurgeError::Usage(
                "--keep and --manual cannot be used together".to_string(),
            ));
        }
        if self.fix {
            let conflicts: Vec<&str> = [
                (self.keep.is_some(), "--keep"),
                (self.manual, "--manual"),
                (self.choose, "--choose"),
                (self.yes, "--yes"),
                (self.optimize, "--optimize"),
            ]
            .into_iter()
            .filter_map(|(set, flag)| set.then_some(flag))
            .collect();
            if !conflicts.is_empty() {
                return Err(PurgeError::Usage(format!(
                    "--fix cannot be combined with {}",
                    conflicts.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Whether the run will change the system.
    pub fn is_mutating(&self) -> bool {
        !self.simulate
    }
}
