//! `hull commit` — Export a container root to a tar.gz archive.

use clap::Args;
use hull_common::config::HullConfig;
use hull_runtime::Engine;
use hull_runtime::commit::DEFAULT_PACKAGE;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Container name.
    pub container: String,

    /// Archive name, written as `<package>.tar.gz` in the current directory.
    #[arg(default_value = DEFAULT_PACKAGE)]
    pub package: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container root is missing or the archive cannot
/// be written.
pub fn execute(args: &CommitArgs, config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    let out_dir = std::env::current_dir()?;
    let archive = engine.commit(&args.container, &args.package, &out_dir)?;
    println!("{}", archive.display());
    Ok(())
}
