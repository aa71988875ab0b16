//! Bootloader regeneration hooks run by kernel packages.
//!
//! Every kernel package removal runs `/etc/kernel/postrm.d/zz-update-grub`.
//! When purging many kernels the hooks are switched off for the duration and
//! the bootloader configuration is regenerated once at the end.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::{debug, warn};

use crate::runtime::Runtime;

const EXEC_BITS: u32 = 0o111;

/// Disables hook scripts by clearing their execute bits; restores the
/// original modes on [`HookGuard::restore`] or when dropped.
pub struct HookGuard<'a, R: Runtime> {
    runtime: &'a R,
    saved: Vec<(PathBuf, u32)>,
}

impl<'a, R: Runtime> HookGuard<'a, R> {
    /// Disable every existing, executable hook. Missing hooks are skipped.
    pub fn disable(runtime: &'a R, hooks: &[PathBuf]) -> Result<Self> {
        let mut guard = Self {
            runtime,
            saved: Vec::new(),
        };
        for hook in hooks {
            if !runtime.exists(hook) {
                continue;
            }
            let mode = runtime.file_mode(hook)?;
            if mode & EXEC_BITS == 0 {
                continue;
            }
            runtime.set_permissions(hook, mode & !EXEC_BITS)?;
            debug!("Disabled hook {:?}", hook);
            guard.saved.push((hook.clone(), mode));
        }
        Ok(guard)
    }

    /// Number of hooks currently disabled.
    pub fn disabled(&self) -> usize {
        self.saved.len()
    }

    /// Restore the original modes, reporting the first failure.
    pub fn restore(mut self) -> Result<()> {
        self.restore_all()
    }

    fn restore_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for (hook, mode) in self.saved.drain(..) {
            if let Err(e) = self.runtime.set_permissions(&hook, mode) {
                warn!("Failed to re-enable {:?}: {:#}", hook, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<R: Runtime> Drop for HookGuard<'_, R> {
    fn drop(&mut self) {
        if !self.saved.is_empty() {
            let _ = self.restore_all();
        }
    }
}

/// Run the bootloader configuration regenerator once.
#[tracing::instrument(skip(runtime))]
pub fn regenerate_bootloader<R: Runtime>(runtime: &R, program: &Path, simulate: bool) -> Result<()> {
    let name = program.display().to_string();
    if !runtime.exists(program) && runtime.which(&name).is_none() {
        warn!("{} not found; bootloader configuration not regenerated", name);
        return Ok(());
    }
    if simulate {
        println!("Would run {}", name);
        return Ok(());
    }

    let code = runtime.run_attached(&name, &[])?;
    if code != 0 {
        bail!("{} failed with exit code {}", name, code);
    }
    Ok(())
}
