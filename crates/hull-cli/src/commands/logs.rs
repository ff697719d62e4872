//! `hull logs` — Print the output of a detached container.

use clap::Args;
use hull_common::config::HullConfig;
use hull_runtime::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the log file cannot be read.
pub fn execute(args: &LogsArgs, config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    print!("{}", engine.logs(&args.container)?);
    Ok(())
}
