use anyhow::{Context, Result};
use log::{debug, warn};
use regex::RegexSet;

use crate::application::{PurgeAction, kept_pattern};
use crate::package::{PackageIndex, PackageManager};
use crate::release::ReleaseSet;
use crate::runtime::Runtime;

use super::config::Config;
use super::{clear_stale_boot_files, print_diagnostics, wait_for_lock};

/// Purge half-installed kernel packages, then let apt repair dependencies.
#[tracing::instrument(skip(runtime, packages, config))]
pub fn fix<R: Runtime, P: PackageManager>(runtime: &R, packages: &P, config: &Config) -> Result<()> {
    let policy = &config.policy;
    let action = PurgeAction::new(runtime, packages, &config.osrelease_path);
    let (index, system) = action.survey()?;

    if config.debug {
        print_diagnostics(policy, &system, None)?;
    }
    if policy.clear_boot {
        clear_stale_boot_files(runtime, config, &system, policy.simulate)?;
    }

    let broken = broken_packages(&index, &system.protected())?;
    if broken.is_empty() {
        println!("No broken kernel packages found.");
    } else {
        println!("Broken kernel packages to purge:");
        for name in &broken {
            println!("  {}", name);
        }
        if !policy.simulate && !runtime.confirm("Proceed with purging?")? {
            println!("Skipped.");
            return Ok(());
        }
    }

    if !policy.simulate {
        wait_for_lock(runtime, packages, config.lock_poll_interval)?;
    }

    // apt-get may refuse the purge while dependencies are broken; the repair
    // step below decides whether the system ends up consistent.
    if let Err(e) = packages.purge(&broken, policy.simulate) {
        warn!("{:#}", e);
    }
    packages.fix_broken(policy.simulate)?;

    if !policy.simulate {
        println!("Kernel packages are consistent.");
    }
    Ok(())
}

/// Broken packages, minus those of the running or held kernels.
fn broken_packages(index: &PackageIndex, protected: &ReleaseSet) -> Result<Vec<String>> {
    let guard = RegexSet::new(protected.iter().map(kept_pattern))
        .context("building patterns of protected releases")?;

    let mut names: Vec<String> = index
        .broken_packages()
        .into_iter()
        .filter(|(release, package)| {
            let keep = package.status.is_held() || guard.is_match(&package.name);
            if keep {
                debug!("Leaving broken package {} of {} alone", package.name, release);
            }
            !keep
        })
        .map(|(_, package)| package.name.clone())
        .collect();
    names.sort();
    Ok(names)
}
