use anyhow::Result;
use log::{debug, info, warn};

use crate::application::{
    PurgeAction, PurgePlan, Selection, SystemReleases, apply_choice, build_plan, checklist,
    releases_to_keep, select,
};
use crate::boot::{HookGuard, regenerate_bootloader};
use crate::chooser::{ChecklistRequest, Chooser};
use crate::error::PurgeError;
use crate::package::PackageManager;
use crate::policy::Policy;
use crate::runtime::Runtime;

use super::config::Config;
use super::{clear_stale_boot_files, ensure_boot_capacity, print_diagnostics, wait_for_lock};

const CHECKLIST_TITLE: &str = "Purge kernels";

const LEGEND: &str = "\
latest: needed by a kernel meta-package
hold:   on hold, will not be purged
manual: installed manually";

/// Purge kernel releases according to the policy, or the user's choice when
/// a chooser is given.
#[tracing::instrument(skip(runtime, packages, chooser, config))]
pub fn purge<R: Runtime, P: PackageManager>(
    runtime: &R,
    packages: &P,
    chooser: Option<&dyn Chooser>,
    config: &Config,
) -> Result<()> {
    let policy = &config.policy;
    let action = PurgeAction::new(runtime, packages, &config.osrelease_path);
    let (index, system) = action.survey()?;

    // /boot is only touched once nothing can be cancelled or declined anymore
    let clear_boot = || -> Result<()> {
        if policy.clear_boot {
            clear_stale_boot_files(runtime, config, &system, policy.simulate)?;
        }
        Ok(())
    };

    let selection = match chooser {
        Some(chooser) => match choose(&system, policy, chooser)? {
            Some(selection) => selection,
            None => {
                println!("No kernels to choose from besides the running one.");
                return clear_boot();
            }
        },
        None => select(&system, policy),
    };

    // Leftovers of removed kernels are only swept when the policy decides;
    // an interactive choice purges exactly what was picked.
    let plan = build_plan(&index, &selection, &system.protected(), !policy.choose)?;

    if config.debug {
        print_diagnostics(policy, &system, Some(&plan))?;
    }

    if plan.is_empty() {
        println!("Nothing to purge.");
        return clear_boot();
    }

    show_plan(&system, &plan, policy.simulate);

    if !policy.yes && !policy.simulate && !runtime.confirm("Proceed with purging?")? {
        println!("Skipped.");
        return Ok(());
    }

    clear_boot()?;
    if !policy.simulate {
        ensure_boot_capacity(runtime, config, &system)?;
        wait_for_lock(runtime, packages, config.lock_poll_interval)?;
    }

    let guard = if policy.optimize && !policy.simulate {
        let guard = HookGuard::disable(runtime, &config.grub_hooks)?;
        debug!("Disabled {} bootloader hook(s)", guard.disabled());
        Some(guard)
    } else {
        None
    };

    let result = packages.purge(&plan.all_packages(), policy.simulate);

    if let Some(guard) = guard {
        guard.restore()?;
    }
    if policy.optimize
        && let Err(e) = regenerate_bootloader(runtime, &config.bootloader, policy.simulate)
    {
        if result.is_ok() {
            return Err(e);
        }
        warn!("{:#}", e);
    }
    result?;

    if !policy.simulate {
        info!("Purged {} package(s)", plan.all_packages().len());
        println!("Purged {} kernel release(s).", plan.releases.len());
    }
    Ok(())
}

/// Ask the user which releases to purge. None when there is nothing to offer.
fn choose(
    system: &SystemReleases,
    policy: &Policy,
    chooser: &dyn Chooser,
) -> Result<Option<Selection>> {
    let keep = releases_to_keep(system, policy);
    let items = checklist(system, &keep);
    if items.is_empty() {
        return Ok(None);
    }

    let mut text = format!(
        "Select the kernel releases to purge. The running kernel {} is not listed.",
        system.current
    );
    if !policy.no_legend {
        text.push_str("\n\n");
        text.push_str(LEGEND);
    }

    let request = ChecklistRequest {
        title: CHECKLIST_TITLE.to_string(),
        text,
        items,
    };
    match chooser.checklist(&request)? {
        Some(tags) => apply_choice(system, &tags).map(Some),
        None => Err(PurgeError::Cancelled.into()),
    }
}

fn show_plan(system: &SystemReleases, plan: &PurgePlan, simulate: bool) {
    println!();
    if simulate {
        println!("Simulation only, nothing will be changed.");
    }
    println!("Running kernel: {}", system.current);
    if !plan.releases.is_empty() {
        println!("Kernel releases to purge:");
        for release in &plan.releases {
            println!("  {}", release);
        }
    }
    println!("Packages to purge:");
    for package in &plan.packages {
        println!("  {}", package);
    }
    for package in &plan.invalid {
        println!("  {} (leftover)", package);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chooser::MockChooser;
    use crate::package::{MockPackageManager, parse_query_output};
    use crate::runtime::{FsStats, MockRuntime};
    use crate::test_utils::{mock_runtime_with_release, test_config};

    const SYSTEM: &str = "\
ii \tlinux-image-4.15.0-20-generic\t
ii \tlinux-image-4.15.0-30-generic\t
ii \tlinux-headers-4.15.0-30\t
ii \tlinux-image-4.15.0-42-generic\t
ii \tlinux-image-generic\tlinux-image-4.15.0-42-generic
rc \tlinux-image-4.15.0-10-generic\t
";

    fn package_manager() -> MockPackageManager {
        let mut pm = MockPackageManager::new();
        pm.expect_query().returning(|| Ok(parse_query_output(SYSTEM)));
        pm.expect_manual_packages().returning(|| Ok(vec![]));
        pm.expect_held_packages().returning(|| Ok(vec![]));
        pm.expect_is_locked().returning(|| Ok(false));
        pm
    }

    fn roomy(runtime: &mut MockRuntime) {
        runtime.expect_fs_stats().returning(|_| {
            Ok(FsStats {
                free_bytes: 512 * 1024 * 1024,
                free_inodes: 10_000,
            })
        });
    }

    #[test]
    fn test_default_policy_purges_only_leftovers() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        roomy(&mut runtime);
        let mut pm = package_manager();
        pm.expect_purge()
            .withf(|pkgs, simulate| pkgs == ["linux-image-4.15.0-10-generic"] && !simulate)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.yes = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_keep_zero_purges_older_releases() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        roomy(&mut runtime);
        let mut pm = package_manager();
        pm.expect_purge()
            .withf(|pkgs, _| {
                pkgs == [
                    "linux-headers-4.15.0-30",
                    "linux-image-4.15.0-10-generic",
                    "linux-image-4.15.0-20-generic",
                    "linux-image-4.15.0-30-generic",
                ]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.keep = Some(0);
        config.policy.yes = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_declined_confirmation_purges_nothing() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        runtime.expect_confirm().returning(|_| Ok(false));
        let mut pm = package_manager();
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.keep = Some(0);
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_simulate_skips_confirmation_and_lock() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        runtime.expect_confirm().never();
        runtime.expect_fs_stats().never();
        let mut pm = MockPackageManager::new();
        pm.expect_query().returning(|| Ok(parse_query_output(SYSTEM)));
        pm.expect_manual_packages().returning(|| Ok(vec![]));
        pm.expect_held_packages().returning(|| Ok(vec![]));
        pm.expect_is_locked().never();
        pm.expect_purge()
            .withf(|_, simulate| *simulate)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.keep = Some(1);
        config.policy.simulate = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_nothing_to_purge() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        runtime.expect_confirm().never();
        let mut pm = MockPackageManager::new();
        pm.expect_query().returning(|| {
            Ok(parse_query_output(
                "ii \tlinux-image-4.15.0-42-generic\t\n\
                 ii \tlinux-image-generic\tlinux-image-4.15.0-42-generic\n",
            ))
        });
        pm.expect_manual_packages().returning(|| Ok(vec![]));
        pm.expect_held_packages().returning(|| Ok(vec![]));
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.keep = Some(0);
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_choice_purges_exactly_the_picked_releases() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        roomy(&mut runtime);
        runtime.expect_confirm().returning(|_| Ok(true));
        let mut chooser = MockChooser::new();
        chooser
            .expect_checklist()
            .withf(|request| {
                let tags: Vec<&str> = request.items.iter().map(|i| i.tag.as_str()).collect();
                tags == ["4.15.0-20-generic", "4.15.0-30-generic"]
                    && request.text.contains("latest:")
            })
            .returning(|_| Ok(Some(vec!["4.15.0-30-generic".to_string()])));
        let mut pm = package_manager();
        pm.expect_purge()
            .withf(|pkgs, _| pkgs == ["linux-headers-4.15.0-30", "linux-image-4.15.0-30-generic"])
            .times(1)
            .returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.choose = true;
        purge(&runtime, &pm, Some(&chooser as &dyn Chooser), &config).unwrap();
    }

    #[test]
    fn test_cancelled_choice() {
        let runtime = mock_runtime_with_release("4.15.0-42-generic");
        let mut chooser = MockChooser::new();
        chooser.expect_checklist().returning(|_| Ok(None));
        let mut pm = package_manager();
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.choose = true;
        config.policy.no_legend = true;
        let err = purge(&runtime, &pm, Some(&chooser as &dyn Chooser), &config).unwrap_err();
        assert_eq!(err.downcast_ref::<PurgeError>(), Some(&PurgeError::Cancelled));
        assert_eq!(crate::error::exit_code(&err), crate::error::EXIT_CANCELLED);
    }

    #[test]
    fn test_choice_with_only_running_kernel_is_noop() {
        let runtime = mock_runtime_with_release("4.15.0-42-generic");
        let mut chooser = MockChooser::new();
        chooser.expect_checklist().never();
        let mut pm = MockPackageManager::new();
        pm.expect_query()
            .returning(|| Ok(parse_query_output("ii \tlinux-image-4.15.0-42-generic\t\n")));
        pm.expect_manual_packages().returning(|| Ok(vec![]));
        pm.expect_held_packages().returning(|| Ok(vec![]));
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.choose = true;
        purge(&runtime, &pm, Some(&chooser as &dyn Chooser), &config).unwrap();
    }

    #[test]
    fn test_optimize_disables_hooks_and_regenerates_once() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        roomy(&mut runtime);
        runtime
            .expect_exists()
            .returning(|p| p.ends_with("zz-update-grub") || p.ends_with("update-grub"));
        runtime.expect_file_mode().returning(|_| Ok(0o755));
        runtime
            .expect_set_permissions()
            .withf(|_, mode| *mode == 0o644)
            .times(2)
            .returning(|_, _| Ok(()));
        let mut pm = package_manager();
        pm.expect_purge().times(1).returning(|_, _| Ok(()));
        runtime
            .expect_set_permissions()
            .withf(|_, mode| *mode == 0o755)
            .times(2)
            .returning(|_, _| Ok(()));
        runtime
            .expect_run_attached()
            .withf(|program, _| program == "/usr/sbin/update-grub")
            .times(1)
            .returning(|_, _| Ok(0));

        let mut config = test_config();
        config.policy.keep = Some(0);
        config.policy.yes = true;
        config.policy.optimize = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test_log::test]
    fn test_purge_failure_restores_hooks() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        roomy(&mut runtime);
        runtime.expect_exists().returning(|_| true);
        runtime.expect_file_mode().returning(|_| Ok(0o755));
        runtime
            .expect_set_permissions()
            .withf(|_, mode| *mode == 0o644)
            .times(2)
            .returning(|_, _| Ok(()));
        runtime
            .expect_set_permissions()
            .withf(|_, mode| *mode == 0o755)
            .times(2)
            .returning(|_, _| Ok(()));
        runtime.expect_run_attached().returning(|_, _| Ok(0));
        let mut pm = package_manager();
        pm.expect_purge()
            .returning(|_, _| Err(PurgeError::PurgeFailed(100).into()));

        let mut config = test_config();
        config.policy.keep = Some(0);
        config.policy.yes = true;
        config.policy.optimize = true;
        let err = purge(&runtime, &pm, None, &config).unwrap_err();
        assert_eq!(err.downcast_ref::<PurgeError>(), Some(&PurgeError::PurgeFailed(100)));
    }

    const DEBIAN: &str = "\
ii \tlinux-image-6.1.0-12-amd64\t
ii \tlinux-headers-6.1.0-12-amd64\tlinux-headers-6.1.0-12-common
ii \tlinux-headers-6.1.0-12-common\t
ii \tlinux-image-6.1.0-13-amd64\t
ii \tlinux-headers-6.1.0-13-amd64\tlinux-headers-6.1.0-13-common
ii \tlinux-headers-6.1.0-13-common\t
ii \tlinux-image-amd64\tlinux-image-6.1.0-13-amd64
ii \tlinux-headers-amd64\tlinux-headers-6.1.0-13-amd64
";

    fn debian_package_manager() -> MockPackageManager {
        let mut pm = MockPackageManager::new();
        pm.expect_query().returning(|| Ok(parse_query_output(DEBIAN)));
        pm.expect_manual_packages().returning(|| Ok(vec![]));
        pm.expect_held_packages().returning(|| Ok(vec![]));
        pm.expect_is_locked().returning(|| Ok(false));
        pm
    }

    #[test]
    fn test_debian_default_policy_keeps_common_headers() {
        let mut runtime = mock_runtime_with_release("6.1.0-13-amd64");
        runtime.expect_confirm().never();
        let mut pm = debian_package_manager();
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.yes = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_debian_keep_zero_purges_whole_older_release() {
        let mut runtime = mock_runtime_with_release("6.1.0-13-amd64");
        roomy(&mut runtime);
        let mut pm = debian_package_manager();
        pm.expect_purge()
            .withf(|pkgs, _| {
                pkgs == [
                    "linux-headers-6.1.0-12-amd64",
                    "linux-headers-6.1.0-12-common",
                    "linux-image-6.1.0-12-amd64",
                ]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.keep = Some(0);
        config.policy.yes = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_self_built_running_kernel() {
        let runtime = mock_runtime_with_release("6.6.0+");
        let mut pm = package_manager();
        pm.expect_purge()
            .withf(|pkgs, simulate| {
                *simulate
                    && pkgs
                        == [
                            "linux-headers-4.15.0-30",
                            "linux-image-4.15.0-10-generic",
                            "linux-image-4.15.0-20-generic",
                            "linux-image-4.15.0-30-generic",
                        ]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.keep = Some(0);
        config.policy.simulate = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_cancelled_choice_leaves_boot_alone() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        runtime.expect_read_dir().never();
        runtime.expect_remove_file().never();
        let mut chooser = MockChooser::new();
        chooser.expect_checklist().returning(|_| Ok(None));
        let mut pm = package_manager();
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.choose = true;
        config.policy.clear_boot = true;
        let err = purge(&runtime, &pm, Some(&chooser as &dyn Chooser), &config).unwrap_err();
        assert_eq!(crate::error::exit_code(&err), crate::error::EXIT_CANCELLED);
    }

    #[test]
    fn test_declined_confirmation_leaves_boot_alone() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        runtime.expect_confirm().returning(|_| Ok(false));
        runtime.expect_read_dir().never();
        runtime.expect_remove_file().never();
        let mut pm = package_manager();
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.keep = Some(0);
        config.policy.clear_boot = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_clear_boot_with_nothing_to_purge() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        runtime.expect_read_dir().returning(|_| {
            Ok(vec![std::path::PathBuf::from("/boot/initrd.img-4.15.0-10-generic")])
        });
        runtime.expect_remove_file().times(1).returning(|_| Ok(()));
        let mut pm = MockPackageManager::new();
        pm.expect_query()
            .returning(|| Ok(parse_query_output("ii \tlinux-image-4.15.0-42-generic\t\n")));
        pm.expect_manual_packages().returning(|| Ok(vec![]));
        pm.expect_held_packages().returning(|| Ok(vec![]));
        pm.expect_purge().never();

        let mut config = test_config();
        config.policy.clear_boot = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }

    #[test]
    fn test_clear_boot_runs_before_purge() {
        let mut runtime = mock_runtime_with_release("4.15.0-42-generic");
        roomy(&mut runtime);
        runtime.expect_read_dir().returning(|_| {
            Ok(vec![
                std::path::PathBuf::from("/boot/vmlinuz-4.15.0-42-generic"),
                std::path::PathBuf::from("/boot/vmlinuz-4.15.0-10-generic"),
            ])
        });
        runtime
            .expect_remove_file()
            .withf(|p| p.ends_with("vmlinuz-4.15.0-10-generic"))
            .times(1)
            .returning(|_| Ok(()));
        let mut pm = package_manager();
        pm.expect_purge().returning(|_, _| Ok(()));

        let mut config = test_config();
        config.policy.clear_boot = true;
        config.policy.yes = true;
        purge(&runtime, &pm, None, &config).unwrap();
    }
}
