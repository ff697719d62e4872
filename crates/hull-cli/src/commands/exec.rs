//! `hull exec` — Execute a command inside a running container.

use clap::Args;
use hull_common::config::HullConfig;
use hull_runtime::Engine;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// Joins the target container's namespaces and runs the command with the
/// terminal attached, exiting with its exit code.
///
/// # Errors
///
/// Returns an error if the container is not running or namespace joining
/// fails.
pub fn execute(args: &ExecArgs, config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    let code = engine.exec(&args.container, &args.command)?;
    std::process::exit(code);
}
