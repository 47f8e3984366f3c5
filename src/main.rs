use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

mod cmd;
mod config;
mod utils;

use config::Settings;

/// pct-auto - run pct against any container in the cluster
///
/// Usage:
///   pct-auto <command> <vmid|hostname> [args...]
///   pct-auto list
///
/// The container may be given by numeric id or by hostname. The command
/// runs on whichever node owns the container: directly when that is this
/// node, through `ssh -t root@<node>` otherwise. Argument-free commands
/// (`list`) run on every node and are merged into one table.
///
/// Global flags go before the command; everything after it is passed to
/// pct untouched.
///
/// Global flags / env:
///   -v / -vv          Increase verbosity (logs on stderr)
///   -q / --quiet      Errors only
///   --config PATH     YAML settings (or PCT_AUTO_CONFIG)
///   RUST_LOG          Overrides the verbosity flags
///
/// Examples:
///   pct-auto start 101
///   pct-auto enter webserver
///   pct-auto set 102 --memory 2048
///   pct-auto list
#[derive(Parser, Debug)]
#[command(
    name = "pct-auto",
    version,
    author,
    about = "pct-auto - run pct commands against any container in the cluster",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error logging
    #[arg(short, long)]
    quiet: bool,

    /// Settings file (YAML)
    #[arg(long, env = "PCT_AUTO_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// pct command, container id or hostname, then pct arguments
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let argv0 = std::env::args().next();
    let executable = utils::executable_name(argv0.as_deref());

    let outcome = Settings::load(cli.config.as_deref())
        .map_err(cmd::Failure::from)
        .and_then(|settings| cmd::execute(&executable, settings, &cli.args));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("ERROR: {}", failure.error);
            if let Some(usage) = failure.usage {
                eprint!("{usage}");
            }
            ExitCode::FAILURE
        }
    }
}
