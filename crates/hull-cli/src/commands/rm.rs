//! `hull rm` — Remove a stopped container.

use clap::Args;
use hull_common::config::HullConfig;
use hull_runtime::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// Cleanup steps that fail are reported as warnings; the container record
/// is removed regardless.
///
/// # Errors
///
/// Returns an error if the container is unknown or not stopped.
pub fn execute(args: &RmArgs, config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    let failures = engine.remove(&args.container)?;
    if !failures.is_empty() {
        tracing::warn!(
            container = %args.container,
            failures = failures.len(),
            "container removed with leftover resources"
        );
    }
    println!("{}", args.container);
    Ok(())
}
