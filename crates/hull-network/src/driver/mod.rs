//! Network drivers materialize networks and endpoints on the host.

pub mod bridge;

use std::fs::File;

use hull_common::error::Result;

use crate::endpoint::{Endpoint, PortMapping};
use crate::network::Network;

pub use bridge::BridgeDriver;

/// Device and firewall operations behind a network.
///
/// The [`crate::NetworkManager`] owns allocation and persistence; a driver
/// only touches kernel state.
pub trait NetworkDriver {
    /// Driver name recorded in each network it creates.
    fn name(&self) -> &str;

    /// Creates the network's devices and outbound NAT.
    ///
    /// # Errors
    ///
    /// Returns an error if any device or rule cannot be created.
    fn create(&self, network: &Network) -> Result<()>;

    /// Removes the network's devices and outbound NAT.
    ///
    /// # Errors
    ///
    /// Returns the first failure; every step is still attempted.
    fn delete(&self, network: &Network) -> Result<()>;

    /// Creates the endpoint's veth pair and attaches the host end.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot be created or attached.
    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;

    /// Moves the peer end into `netns` and configures it from inside.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The calling thread is back in its
    /// own namespace either way.
    fn configure_endpoint(&self, endpoint: &Endpoint, netns: &File) -> Result<()>;

    /// Removes the endpoint's veth pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the host end cannot be deleted.
    fn disconnect(&self, endpoint: &Endpoint) -> Result<()>;

    /// Installs the DNAT rule for `mapping`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule cannot be installed.
    fn expose_port(&self, endpoint: &Endpoint, mapping: PortMapping) -> Result<()>;

    /// Removes the DNAT rule for `mapping`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule cannot be removed.
    fn unexpose_port(&self, endpoint: &Endpoint, mapping: PortMapping) -> Result<()>;
}
