//! Runtime abstraction for system operations.
//!
//! Every side effect of the tool goes through the [`Runtime`] trait so the
//! selection and purge logic can be exercised against a mock.
//!
//! # Structure
//!
//! - `env` - Environment variables, privilege, terminal and timing
//! - `process` - Running external programs
//! - `fs` - File system operations and `/boot` capacity
//! - `user` - User interaction (confirmation prompts)

mod env;
mod fs;
mod process;
mod user;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Captured result of an external program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code, None when the program was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Free space on a filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FsStats {
    pub free_bytes: u64,
    pub free_inodes: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait Runtime {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;
    fn is_privileged(&self) -> bool;
    /// Locate a program on PATH.
    fn which(&self, program: &str) -> Option<PathBuf>;
    /// Terminal size as (rows, columns), None when stdout is not a terminal.
    fn terminal_size(&self) -> Option<(u16, u16)>;
    fn sleep(&self, duration: Duration);

    // Processes
    /// Run a program with captured stdout and stderr.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run a program attached to the terminal. Returns its exit code.
    fn run_attached(&self, program: &str, args: &[String]) -> Result<i32>;

    /// Run a full-screen program on the terminal while capturing its stderr,
    /// where `dialog` and `whiptail` write the user's answer.
    fn run_dialog(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn file_mode(&self, path: &Path) -> Result<u32>;
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;
    fn fs_stats(&self, path: &Path) -> Result<FsStats>;

    // User interaction
    /// Prompt user for confirmation. Returns true if user confirms (y/yes), false otherwise.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn is_privileged(&self) -> bool {
        self.is_privileged_impl()
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.which_impl(program)
    }

    fn terminal_size(&self) -> Option<(u16, u16)> {
        self.terminal_size_impl()
    }

    fn sleep(&self, duration: Duration) {
        self.sleep_impl(duration)
    }

    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.run_impl(program, args)
    }

    fn run_attached(&self, program: &str, args: &[String]) -> Result<i32> {
        self.run_attached_impl(program, args)
    }

    fn run_dialog(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.run_dialog_impl(program, args)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn file_mode(&self, path: &Path) -> Result<u32> {
        self.file_mode_impl(path)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        self.set_permissions_impl(path, mode)
    }

    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        self.fs_stats_impl(path)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirm_impl(prompt)
    }
}
