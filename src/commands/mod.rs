use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

use crate::{
    application::{PurgePlan, SystemReleases},
    boot::{clear_boot, stale_boot_files},
    chooser::{Interface, build_chooser},
    error::PurgeError,
    package::{AptPackageManager, PackageManager},
    policy::Policy,
    runtime::Runtime,
};

pub mod config;
mod fix;
mod purge;

pub use fix::fix;
pub use purge::purge;

use config::Config;

/// Entry point of a run: validate, check privileges, then repair or purge.
#[tracing::instrument(skip(runtime, config))]
pub fn run<R: Runtime>(runtime: &R, config: &Config) -> Result<()> {
    config.policy.validate()?;

    if config.policy.is_mutating() && !runtime.is_privileged() {
        return Err(PurgeError::Privilege.into());
    }

    let packages = AptPackageManager::new(runtime, config.lock_files.clone());

    if config.policy.fix {
        return fix(runtime, &packages, config);
    }

    let chooser = if config.policy.choose {
        let interface = Interface::resolve(runtime, config.interface)?;
        Some(build_chooser(runtime, interface))
    } else {
        None
    };
    purge(runtime, &packages, chooser.as_deref(), config)
}

/// Block until no other package manager holds the dpkg/apt locks.
pub(crate) fn wait_for_lock<R: Runtime, P: PackageManager>(
    runtime: &R,
    packages: &P,
    interval: Duration,
) -> Result<()> {
    let mut waited = false;
    while packages.is_locked()? {
        if !waited {
            println!("Waiting for other package managers to finish...");
            waited = true;
        }
        debug!("Package manager locked, retrying in {:?}", interval);
        runtime.sleep(interval);
    }
    if waited {
        info!("Package manager lock released");
    }
    Ok(())
}

/// Remove files of uninstalled kernels from /boot. Returns how many were
/// (or would be) removed.
pub(crate) fn clear_stale_boot_files<R: Runtime>(
    runtime: &R,
    config: &Config,
    system: &SystemReleases,
    simulate: bool,
) -> Result<usize> {
    let wanted = system.installed.union(&system.protected());
    let stale = stale_boot_files(runtime, &config.boot_dir, &wanted)?;
    if stale.is_empty() {
        println!("No stale files in {}.", config.boot_dir.display());
        return Ok(0);
    }
    clear_boot(runtime, &stale, simulate)
}

/// Make sure /boot has room for the maintainer scripts, clearing stale
/// kernel files when it does not.
pub(crate) fn ensure_boot_capacity<R: Runtime>(
    runtime: &R,
    config: &Config,
    system: &SystemReleases,
) -> Result<()> {
    let shortage = match config.capacity.shortage(runtime, &config.boot_dir) {
        Ok(shortage) => shortage,
        Err(e) => {
            warn!("Cannot check free space of {:?}: {:#}", config.boot_dir, e);
            return Ok(());
        }
    };
    let Some(stats) = shortage else {
        return Ok(());
    };

    let wanted = system.installed.union(&system.protected());
    let stale = stale_boot_files(runtime, &config.boot_dir, &wanted)?;
    if stale.is_empty() {
        return Err(PurgeError::InsufficientBootSpace {
            free_bytes: stats.free_bytes,
            free_inodes: stats.free_inodes,
        }
        .into());
    }

    warn!(
        "{} is nearly full, removing {} stale file(s) first",
        config.boot_dir.display(),
        stale.len()
    );
    clear_boot(runtime, &stale, false)?;

    match config.capacity.shortage(runtime, &config.boot_dir)? {
        Some(stats) => Err(PurgeError::InsufficientBootSpace {
            free_bytes: stats.free_bytes,
            free_inodes: stats.free_inodes,
        }
        .into()),
        None => Ok(()),
    }
}

#[derive(Serialize)]
struct Diagnostics<'a> {
    policy: &'a Policy,
    system: &'a SystemReleases,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<&'a PurgePlan>,
}

/// Dump the gathered state as JSON on stderr.
pub(crate) fn print_diagnostics(
    policy: &Policy,
    system: &SystemReleases,
    plan: Option<&PurgePlan>,
) -> Result<()> {
    let diagnostics = Diagnostics {
        policy,
        system,
        plan,
    };
    let json = serde_json::to_string_pretty(&diagnostics).context("serializing diagnostics")?;
    eprintln!("{}", json);
    Ok(())
}
