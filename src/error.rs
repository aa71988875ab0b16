//! Classified failures and their process exit codes.

/// Exit code for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for an invalid command line.
pub const EXIT_USAGE: u8 = 1;
/// Exit code when root privileges are required but missing.
pub const EXIT_PRIVILEGE: u8 = 2;
/// Exit code for operational failures and unexpected errors.
pub const EXIT_FAILURE: u8 = 3;
/// Exit code when the user cancels the interactive selection.
pub const EXIT_CANCELLED: u8 = 4;

/// Errors that map to a specific exit code.
///
/// Anything not wrapped in a `PurgeError` is reported as an operational
/// failure.
#[derive(Debug, PartialEq)]
pub enum PurgeError {
    /// Bad option or option combination
    Usage(String),
    /// A mutating run was started without root privileges
    Privilege,
    /// The user aborted the interactive selection
    Cancelled,
    /// The interactive selection was confirmed with nothing checked
    NothingChosen,
    /// The package manager failed to purge packages
    PurgeFailed(i32),
    /// Broken kernel packages remain after repair
    Unfixable(i32),
    /// The terminal cannot fit the checklist dialog
    TerminalTooSmall { rows: u16, cols: u16 },
    /// /boot is too full and nothing can be safely removed from it
    InsufficientBootSpace { free_bytes: u64, free_inodes: u64 },
}

impl PurgeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PurgeError::Usage(_) => EXIT_USAGE,
            PurgeError::Privilege => EXIT_PRIVILEGE,
            PurgeError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

impl std::fmt::Display for PurgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurgeError::Usage(msg) => write!(f, "{}. Try --help for more information.", msg),
            PurgeError::Privilege => {
                write!(f, "Root privileges are required. Run with sudo or use --simulate.")
            }
            PurgeError::Cancelled => write!(f, "Cancelled by user; nothing was changed."),
            PurgeError::NothingChosen => write!(f, "You must choose at least one release."),
            PurgeError::PurgeFailed(code) => {
                write!(f, "Package manager failed to purge kernels (exit code {})", code)
            }
            PurgeError::Unfixable(code) => write!(
                f,
                "Could not fix broken kernel packages (apt-get exit code {})",
                code
            ),
            PurgeError::TerminalTooSmall { rows, cols } => write!(
                f,
                "Terminal is too small for the checklist ({}x{}); enlarge it or use --interface terminal",
                cols, rows
            ),
            PurgeError::InsufficientBootSpace {
                free_bytes,
                free_inodes,
            } => write!(
                f,
                "Insufficient disk space or inodes in /boot ({} KiB, {} inodes free) and no stale boot files to remove",
                free_bytes / 1024,
                free_inodes
            ),
        }
    }
}

impl std::error::Error for PurgeError {}

/// Find the exit code for an error chain.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PurgeError>())
        .map(PurgeError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        assert_eq!(PurgeError::Usage("x".into()).exit_code(), EXIT_USAGE);
        assert_eq!(PurgeError::Privilege.exit_code(), EXIT_PRIVILEGE);
        assert_eq!(PurgeError::Cancelled.exit_code(), EXIT_CANCELLED);
        assert_eq!(PurgeError::NothingChosen.exit_code(), EXIT_FAILURE);
        assert_eq!(PurgeError::PurgeFailed(100).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_exit_code_through_context() {
        let err = Err::<(), _>(PurgeError::Privilege)
            .context("while purging")
            .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_PRIVILEGE);
    }

    #[test]
    fn test_unclassified_error_is_failure() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&err), EXIT_FAILURE);
    }

    #[test]
    fn test_display_mentions_remedy() {
        assert!(PurgeError::Privilege.to_string().contains("--simulate"));
        assert!(
            PurgeError::Usage("--auto-only requires --keep".into())
                .to_string()
                .contains("--help")
        );
    }
}
