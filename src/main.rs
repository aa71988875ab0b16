use clap::Parser;
use linux_purge::{
    chooser::Interface,
    commands::{self, config::Config},
    error::{self, EXIT_SUCCESS, EXIT_USAGE, PurgeError},
    policy::Policy,
};
use std::process::ExitCode;

/// linux-purge - purge unused Linux kernels
///
/// Removes kernel releases and leftover kernel packages on Debian-family
/// systems. The running kernel and held releases are never purged.
///
/// Without options only leftovers of removed kernels are purged.
///
/// Examples:
///   linux-purge --keep 1       # Keep the latest kernel and one before it
///   linux-purge --choose       # Pick the releases to purge from a checklist
///   linux-purge --fix          # Repair half-installed kernel packages
#[derive(Parser, Debug)]
#[command(author, version = env!("LINUX_PURGE_VERSION"), about)]
struct Cli {
    /// Keep N releases older than the latest one of each flavor
    #[arg(short = 'k', long, value_name = "N")]
    keep: Option<usize>,

    /// Only purge automatically installed releases (requires --keep)
    #[arg(short = 'a', long)]
    auto_only: bool,

    /// Purge manually installed releases, keep automatic ones
    #[arg(short = 'm', long)]
    manual: bool,

    /// Choose the releases to purge from a checklist
    #[arg(short = 'c', long)]
    choose: bool,

    /// Remove files of uninstalled kernels from /boot
    #[arg(short = 'b', long)]
    clear_boot: bool,

    /// Purge broken kernel packages and repair dependencies
    #[arg(short = 'f', long)]
    fix: bool,

    /// Show what would be done without changing anything
    #[arg(short = 's', long)]
    simulate: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Do not show the marker legend in the checklist
    #[arg(short = 'n', long)]
    no_legend: bool,

    /// Regenerate the GRUB configuration once instead of after every package
    #[arg(short = 'o', long)]
    optimize: bool,

    /// Checklist front end (default: dialog, whiptail, then terminal)
    #[arg(
        short = 'i',
        long,
        value_enum,
        env = "LINUX_PURGE_INTERFACE",
        value_name = "INTERFACE"
    )]
    interface: Option<Interface>,

    /// Print debug logs and the gathered state
    #[arg(short = 'd', long)]
    debug: bool,
}

impl Cli {
    fn policy(&self) -> Policy {
        Policy {
            keep: self.keep,
            auto_only: self.auto_only,
            manual: self.manual,
            choose: self.choose,
            clear_boot: self.clear_boot,
            fix: self.fix,
            simulate: self.simulate,
            yes: self.yes,
            no_legend: self.no_legend,
            optimize: self.optimize,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are reported through clap errors too
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::new(cli.policy(), cli.interface, cli.debug);
    let runtime = linux_purge::runtime::RealRuntime;

    match commands::run(&runtime, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e.chain().all(|cause| cause.downcast_ref::<PurgeError>().is_none()) {
                eprintln!("\n{:?}", e);
            }
            ExitCode::from(error::exit_code(&e))
        }
    }
}
