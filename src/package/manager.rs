//! Package manager collaborator: queries and purges through dpkg and apt.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, warn};

use super::record::{PackageRecord, parse_query_output};
use crate::error::PurgeError;
use crate::runtime::Runtime;

/// dpkg-query format producing tab-separated status, name and dependencies.
const QUERY_FORMAT: &str = "${db:Status-Abbrev}\t${Package}\t${Depends}\n";

/// Package name patterns the query is restricted to.
const QUERY_PATTERNS: &[&str] = &["linux-*"];

#[cfg_attr(test, mockall::automock)]
pub trait PackageManager {
    /// All kernel-related packages known to the package database.
    fn query(&self) -> Result<Vec<PackageRecord>>;

    /// Names of packages marked as manually installed.
    fn manual_packages(&self) -> Result<Vec<String>>;

    /// Names of packages on hold.
    fn held_packages(&self) -> Result<Vec<String>>;

    /// Whether another process holds the dpkg/apt locks.
    fn is_locked(&self) -> Result<bool>;

    /// Purge packages. In simulate mode the package manager only reports.
    fn purge(&self, packages: &[String], simulate: bool) -> Result<()>;

    /// Let apt repair broken dependencies.
    fn fix_broken(&self, simulate: bool) -> Result<()>;
}

/// [`PackageManager`] backed by `dpkg-query`, `apt-mark` and `apt-get`.
pub struct AptPackageManager<'a, R: Runtime> {
    runtime: &'a R,
    lock_files: Vec<PathBuf>,
}

impl<'a, R: Runtime> AptPackageManager<'a, R> {
    pub fn new(runtime: &'a R, lock_files: Vec<PathBuf>) -> Self {
        Self {
            runtime,
            lock_files,
        }
    }

    fn apt_mark(&self, subcommand: &str) -> Result<Vec<String>> {
        let output = self
            .runtime
            .run("apt-mark", &[subcommand.to_string()])
            .with_context(|| format!("listing packages with apt-mark {}", subcommand))?;
        if !output.success() {
            anyhow::bail!(
                "apt-mark {} failed: {}",
                subcommand,
                output.stderr.trim()
            );
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.split(':').next().unwrap_or(line).to_string())
            .collect())
    }

    fn apt_get_args(&self, action: &[&str], simulate: bool) -> Vec<String> {
        let mut args: Vec<String> = action.iter().map(|s| s.to_string()).collect();
        args.push("--yes".to_string());
        if simulate {
            args.push("--simulate".to_string());
        }
        args
    }
}

impl<R: Runtime> PackageManager for AptPackageManager<'_, R> {
    #[tracing::instrument(skip(self))]
    fn query(&self) -> Result<Vec<PackageRecord>> {
        let mut args = vec!["-W".to_string(), format!("-f={}", QUERY_FORMAT)];
        args.extend(QUERY_PATTERNS.iter().map(|p| p.to_string()));

        let output = self
            .runtime
            .run("dpkg-query", &args)
            .context("querying the package database")?;

        // dpkg-query exits 1 when a pattern matches nothing
        if !output.success() {
            if output.code != Some(1) {
                anyhow::bail!("dpkg-query failed: {}", output.stderr.trim());
            }
            debug!("dpkg-query reported: {}", output.stderr.trim());
        }

        let records = parse_query_output(&output.stdout);
        debug!("Package database lists {} kernel package(s)", records.len());
        Ok(records)
    }

    fn manual_packages(&self) -> Result<Vec<String>> {
        self.apt_mark("showmanual")
    }

    fn held_packages(&self) -> Result<Vec<String>> {
        self.apt_mark("showhold")
    }

    fn is_locked(&self) -> Result<bool> {
        let args: Vec<String> = self
            .lock_files
            .iter()
            .filter(|path| self.runtime.exists(path))
            .map(|path| path.display().to_string())
            .collect();
        if args.is_empty() {
            return Ok(false);
        }

        // fuser exits 0 when some process uses one of the files
        match self.runtime.run("fuser", &args) {
            Ok(output) => Ok(output.success()),
            Err(e) => {
                warn!("Cannot check package manager locks: {:#}", e);
                Ok(false)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn purge(&self, packages: &[String], simulate: bool) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut args = self.apt_get_args(&["purge"], simulate);
        args.extend(packages.iter().cloned());

        let code = self
            .runtime
            .run_attached("apt-get", &args)
            .context("running apt-get purge")?;
        if code != 0 {
            return Err(PurgeError::PurgeFailed(code).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn fix_broken(&self, simulate: bool) -> Result<()> {
        let args = self.apt_get_args(&["--fix-broken", "install"], simulate);
        let code = self
            .runtime
            .run_attached("apt-get", &args)
            .context("running apt-get --fix-broken install")?;
        if code != 0 {
            return Err(PurgeError::Unfixable(code).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};
    use mockall::predicate::eq;

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn lock_files() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/var/lib/dpkg/lock"),
            PathBuf::from("/var/lib/dpkg/lock-frontend"),
        ]
    }

    #[test]
    fn test_query_parses_records() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .withf(|program, args| {
                program == "dpkg-query" && args[0] == "-W" && args.last().unwrap() == "linux-*"
            })
            .returning(|_, _| Ok(ok("ii \tlinux-image-4.15.0-42-generic\t\nrc \tlinux-image-4.15.0-20-generic\t\n")));

        let pm = AptPackageManager::new(&runtime, lock_files());
        let records = pm.query().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "linux-image-4.15.0-20-generic");
    }

    #[test]
    fn test_query_no_match_is_empty() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "dpkg-query: no packages found matching linux-*".to_string(),
            })
        });

        let pm = AptPackageManager::new(&runtime, lock_files());
        assert!(pm.query().unwrap().is_empty());
    }

    #[test]
    fn test_query_failure_is_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(2),
                stdout: String::new(),
                stderr: "dpkg-query: error: database is corrupt".to_string(),
            })
        });

        let pm = AptPackageManager::new(&runtime, lock_files());
        let err = pm.query().unwrap_err();
        assert!(err.to_string().contains("database is corrupt"));
    }

    #[test]
    fn test_query_partial_output_with_failure_is_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(2),
                stdout: "ii \tlinux-image-4.15.0-42-generic\t\n".to_string(),
                stderr: "dpkg-query: error: parsing file '/var/lib/dpkg/status'".to_string(),
            })
        });

        let pm = AptPackageManager::new(&runtime, lock_files());
        let err = pm.query().unwrap_err();
        assert!(err.to_string().contains("parsing file"));
    }

    #[test]
    fn test_query_partial_match_is_accepted() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run().returning(|_, _| {
            Ok(CommandOutput {
                code: Some(1),
                stdout: "ii \tlinux-image-4.15.0-42-generic\t\n".to_string(),
                stderr: "dpkg-query: no packages found matching linux-signed-*".to_string(),
            })
        });

        let pm = AptPackageManager::new(&runtime, lock_files());
        assert_eq!(pm.query().unwrap().len(), 1);
    }

    #[test]
    fn test_held_packages_strip_architecture() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .with(eq("apt-mark"), eq(vec!["showhold".to_string()]))
            .returning(|_, _| Ok(ok("linux-image-4.15.0-20-generic:amd64\n\nlinux-headers-4.15.0-20\n")));

        let pm = AptPackageManager::new(&runtime, lock_files());
        assert_eq!(
            pm.held_packages().unwrap(),
            vec!["linux-image-4.15.0-20-generic", "linux-headers-4.15.0-20"]
        );
    }

    #[test]
    fn test_is_locked_checks_existing_lock_files() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/var/lib/dpkg/lock")))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/var/lib/dpkg/lock-frontend")))
            .returning(|_| false);
        runtime
            .expect_run()
            .with(eq("fuser"), eq(vec!["/var/lib/dpkg/lock".to_string()]))
            .returning(|_, _| Ok(ok("")));

        let pm = AptPackageManager::new(&runtime, lock_files());
        assert!(pm.is_locked().unwrap());
    }

    #[test]
    fn test_is_locked_without_fuser_is_unlocked() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_run()
            .returning(|_, _| Err(anyhow::anyhow!("executing 'fuser'")));

        let pm = AptPackageManager::new(&runtime, lock_files());
        assert!(!pm.is_locked().unwrap());
    }

    #[test]
    fn test_purge_passes_simulate() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_attached()
            .with(
                eq("apt-get"),
                eq(vec![
                    "purge".to_string(),
                    "--yes".to_string(),
                    "--simulate".to_string(),
                    "linux-image-4.15.0-20-generic".to_string(),
                ]),
            )
            .times(1)
            .returning(|_, _| Ok(0));

        let pm = AptPackageManager::new(&runtime, lock_files());
        pm.purge(&["linux-image-4.15.0-20-generic".to_string()], true)
            .unwrap();
    }

    #[test]
    fn test_purge_empty_list_runs_nothing() {
        let runtime = MockRuntime::new();
        let pm = AptPackageManager::new(&runtime, lock_files());
        pm.purge(&[], false).unwrap();
    }

    #[test]
    fn test_purge_failure_carries_exit_code() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run_attached().returning(|_, _| Ok(100));

        let pm = AptPackageManager::new(&runtime, lock_files());
        let err = pm
            .purge(&["linux-image-4.15.0-20-generic".to_string()], false)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PurgeError>(),
            Some(&PurgeError::PurgeFailed(100))
        );
    }

    #[test]
    fn test_fix_broken_failure_is_unfixable() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_attached()
            .withf(|program, args| program == "apt-get" && args[0] == "--fix-broken")
            .returning(|_, _| Ok(100));

        let pm = AptPackageManager::new(&runtime, lock_files());
        let err = pm.fix_broken(false).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PurgeError>(),
            Some(&PurgeError::Unfixable(100))
        );
    }
}
