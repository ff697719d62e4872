//! `hull stop` — Stop a running container.

use clap::Args;
use hull_common::config::HullConfig;
use hull_runtime::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be signalled.
pub fn execute(args: &StopArgs, config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    let _ = engine.stop(&args.container)?;
    println!("{}", args.container);
    Ok(())
}
