//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod logs;
pub mod network;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hull_common::config::HullConfig;
use hull_common::constants::{DEFAULT_ROOT_DIR, ROOT_DIR_ENV};

/// hull — minimal Linux container runtime.
#[derive(Parser, Debug)]
#[command(name = "hull", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Runtime root holding images, containers and network state.
    #[arg(long, global = true, env = ROOT_DIR_ENV, default_value = DEFAULT_ROOT_DIR)]
    pub root: PathBuf,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// Container bootstrap; invoked by `run`, not by users.
    #[command(hide = true)]
    Init,
    /// List containers.
    Ps,
    /// Print the output of a detached container.
    Logs(logs::LogsArgs),
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// Export a container root to a tar.gz archive.
    Commit(commit::CommitArgs),
    /// Manage container networks.
    #[command(subcommand)]
    Network(network::NetworkCommand),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = HullConfig::with_root(cli.root);
    match cli.command {
        Command::Run(args) => run::execute(args, &config),
        Command::Init => init::execute(),
        Command::Ps => ps::execute(&config),
        Command::Logs(args) => logs::execute(&args, &config),
        Command::Exec(args) => exec::execute(&args, &config),
        Command::Stop(args) => stop::execute(&args, &config),
        Command::Rm(args) => rm::execute(&args, &config),
        Command::Commit(args) => commit::execute(&args, &config),
        Command::Network(cmd) => network::execute(cmd, &config),
    }
}
