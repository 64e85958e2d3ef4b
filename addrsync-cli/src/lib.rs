//! Command-line interface for address reconciliation.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod reconcile;

pub use error::CliError;

use reconcile::ReconcileArgs;

const ARG_UNITS: &str = "unit";
const ARG_INPUT_DIR: &str = "input-dir";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ARG_CORRECTIONS: &str = "corrections";
const ARG_GROUP: &str = "group";
const ARG_SOURCE_ONLY: &str = "source-only";
const ARG_FIX_INITIALS: &str = "fix-initials";
const ARG_MANUAL: &str = "manual";
const ARG_BUDGET: &str = "budget";
const ARG_MAX_RELOCATION: &str = "max-relocation";
const ARG_EXACT_THRESHOLD: &str = "exact-threshold";
const ARG_SANITY_BOUND: &str = "sanity-bound";
const ENV_UNITS: &str = "ADDRSYNC_CMDS_RECONCILE_UNITS";
const ENV_INPUT_DIR: &str = "ADDRSYNC_CMDS_RECONCILE_INPUT_DIR";
const ENV_OUTPUT_DIR: &str = "ADDRSYNC_CMDS_RECONCILE_OUTPUT_DIR";

/// Run the addrsync CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when parsing, configuration or reconciliation fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Reconcile(args) => reconcile::run_reconcile(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "addrsync",
    about = "Bring map address data in line with the address registry",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile units and write change documents.
    Reconcile(ReconcileArgs),
}

#[cfg(test)]
mod tests;
