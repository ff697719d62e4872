//! Linux bridge driver.
//!
//! Each network is a bridge named after it holding the gateway address.
//! Containers hang off the bridge through veth pairs.

use std::fs::File;

use hull_common::constants::BRIDGE_DRIVER;
use hull_common::error::{HullError, Result};
use hull_core::namespace::network::NetnsGuard;

use super::NetworkDriver;
use crate::endpoint::{Endpoint, PortMapping};
use crate::firewall::{self, RuleAction};
use crate::netlink::{self, NetlinkSocket};
use crate::network::Network;

/// Driver backed by a kernel bridge, veth pairs and iptables NAT.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeDriver;

impl BridgeDriver {
    fn setup_bridge(sock: &mut NetlinkSocket, network: &Network) -> Result<()> {
        let index = netlink::ifindex(&network.name)?;
        sock.add_address(index, network.ip_range)?;
        sock.set_up(index)?;
        firewall::run_iptables(&firewall::masquerade_args(
            RuleAction::Append,
            network.subnet(),
            &network.name,
        ))
    }
}

/// Looks up interface `name`, treating a missing one as `None`.
fn link_index(name: &str) -> Result<Option<u32>> {
    match netlink::ifindex(name) {
        Ok(index) => Ok(Some(index)),
        Err(HullError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &str {
        BRIDGE_DRIVER
    }

    fn create(&self, network: &Network) -> Result<()> {
        let mut sock = NetlinkSocket::open()?;
        sock.create_bridge(&network.name)?;
        if let Err(e) = Self::setup_bridge(&mut sock, network) {
            if let Ok(index) = netlink::ifindex(&network.name) {
                if let Err(cleanup) = sock.delete_link(index) {
                    tracing::warn!(bridge = %network.name, error = %cleanup, "bridge rollback failed");
                }
            }
            return Err(e);
        }
        tracing::info!(bridge = %network.name, gateway = %network.ip_range, "bridge created");
        Ok(())
    }

    fn delete(&self, network: &Network) -> Result<()> {
        let link = link_index(&network.name).and_then(|index| match index {
            Some(index) => NetlinkSocket::open()?.delete_link(index),
            None => {
                tracing::debug!(bridge = %network.name, "bridge already gone");
                Ok(())
            }
        });
        if let Err(e) = &link {
            tracing::warn!(bridge = %network.name, error = %e, "bridge removal failed");
        }
        let rule = firewall::run_iptables(&firewall::masquerade_args(
            RuleAction::Delete,
            network.subnet(),
            &network.name,
        ));
        if let Err(e) = &rule {
            tracing::warn!(bridge = %network.name, error = %e, "masquerade removal failed");
        }
        link.and(rule)
    }

    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        let mut sock = NetlinkSocket::open()?;
        sock.create_veth(&endpoint.host_veth, &endpoint.peer_veth, endpoint.mac)?;
        let host = netlink::ifindex(&endpoint.host_veth)?;
        let bridge = netlink::ifindex(&network.name)?;
        sock.set_master(host, bridge)?;
        sock.set_up(host)?;
        tracing::debug!(veth = %endpoint.host_veth, bridge = %network.name, "veth attached");
        Ok(())
    }

    fn configure_endpoint(&self, endpoint: &Endpoint, netns: &File) -> Result<()> {
        let peer = netlink::ifindex(&endpoint.peer_veth)?;
        NetlinkSocket::open()?.set_netns(peer, netns)?;

        let _guard = NetnsGuard::enter(netns)?;
        // The host socket still talks to the host namespace.
        let mut sock = NetlinkSocket::open()?;
        let peer = netlink::ifindex(&endpoint.peer_veth)?;
        sock.add_address(peer, endpoint.interface_addr)?;
        sock.set_up(peer)?;
        sock.set_up(netlink::ifindex("lo")?)?;
        sock.add_default_route(peer, endpoint.gateway)?;
        tracing::debug!(
            interface = %endpoint.peer_veth,
            address = %endpoint.interface_addr,
            "endpoint configured"
        );
        Ok(())
    }

    fn disconnect(&self, endpoint: &Endpoint) -> Result<()> {
        let index = netlink::ifindex(&endpoint.host_veth)?;
        NetlinkSocket::open()?.delete_link(index)?;
        tracing::debug!(veth = %endpoint.host_veth, "veth removed");
        Ok(())
    }

    fn expose_port(&self, endpoint: &Endpoint, mapping: PortMapping) -> Result<()> {
        firewall::run_iptables(&firewall::dnat_args(RuleAction::Append, mapping, endpoint.ip))
    }

    fn unexpose_port(&self, endpoint: &Endpoint, mapping: PortMapping) -> Result<()> {
        firewall::run_iptables(&firewall::dnat_args(RuleAction::Delete, mapping, endpoint.ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_link_is_none() {
        assert_eq!(link_index("hullgone0").unwrap(), None);
    }

    #[test]
    fn loopback_link_is_found() {
        assert!(link_index("lo").unwrap().is_some());
    }

    #[test]
    fn invalid_link_name_is_an_error() {
        assert!(link_index("bad\0name").is_err());
    }
}
