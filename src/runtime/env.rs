//! Environment and system information operations.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dialoguer::console::Term;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_privileged_impl(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn which_impl(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    pub(crate) fn terminal_size_impl(&self) -> Option<(u16, u16)> {
        Term::stdout().size_checked()
    }

    pub(crate) fn sleep_impl(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_real_runtime_env_and_tools() {
        let runtime = RealRuntime;

        // PATH should exist on all systems
        assert!(runtime.env_var("PATH").is_ok());
        assert!(runtime.env_var("LINUX_PURGE_SURELY_UNSET_VARIABLE").is_err());

        // `sh` is on every Unix PATH
        assert!(runtime.which("sh").is_some());
        assert!(runtime.which("linux-purge-no-such-program").is_none());

        // Should work without panic
        let _ = runtime.is_privileged();
        let _ = runtime.terminal_size();
    }
}
