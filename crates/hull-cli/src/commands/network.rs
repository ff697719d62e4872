//! `hull network` — Manage container networks.

use clap::{Args, Subcommand};
use hull_common::config::HullConfig;
use hull_common::constants::BRIDGE_DRIVER;
use hull_network::NetworkManager;

use crate::output;

/// Network subcommands.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// Create a network.
    Create(CreateArgs),
    /// List networks.
    List,
    /// Remove a network.
    Remove(RemoveArgs),
}

/// Arguments for `network create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Network driver.
    #[arg(long, default_value = BRIDGE_DRIVER)]
    pub driver: String,

    /// Subnet in CIDR notation, e.g. `192.168.10.0/24`.
    #[arg(long)]
    pub subnet: String,

    /// Network name.
    pub name: String,
}

/// Arguments for `network remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Network name.
    pub name: String,
}

/// Executes a `network` subcommand.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded or the operation fails.
pub fn execute(cmd: NetworkCommand, config: &HullConfig) -> anyhow::Result<()> {
    let mut manager = NetworkManager::init(&config.layout())?;
    match cmd {
        NetworkCommand::Create(args) => {
            let network = manager.create_network(&args.driver, &args.subnet, &args.name)?;
            println!("{}", network.name);
        }
        NetworkCommand::List => {
            let rows: Vec<Vec<String>> = manager
                .list_networks()
                .map(|n| vec![n.name.clone(), n.ip_range.to_string(), n.driver.clone()])
                .collect();
            print!("{}", output::table(&["NAME", "IPRANGE", "DRIVER"], &rows));
        }
        NetworkCommand::Remove(args) => {
            manager.delete_network(&args.name)?;
            println!("{}", args.name);
        }
    }
    Ok(())
}
