//! Container attachments to a network.

use std::net::Ipv4Addr;

use hull_common::types::ContainerId;
use ipnetwork::Ipv4Network;

/// Characters of the container id used in veth names.
const VETH_ID_LEN: usize = 8;

/// Host-side veth name prefix.
const HOST_VETH_PREFIX: &str = "veth";

/// Container-side veth name prefix.
const PEER_VETH_PREFIX: &str = "cif-";

/// One container's attachment to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `<container id>-<network name>`.
    pub id: String,
    /// Veth end attached to the bridge.
    pub host_veth: String,
    /// Veth end moved into the container.
    pub peer_veth: String,
    /// Address assigned to `peer_veth`.
    pub ip: Ipv4Addr,
    /// Locally administered MAC derived from `ip`.
    pub mac: [u8; 6],
    /// Interface address with the network's prefix.
    pub interface_addr: Ipv4Network,
    /// Gateway used for the container's default route.
    pub gateway: Ipv4Addr,
    /// Network the endpoint belongs to, by name.
    pub network: String,
    /// Port mappings that parsed successfully.
    pub port_mappings: Vec<PortMapping>,
}

impl Endpoint {
    /// Builds the endpoint for container `id` on `network`.
    #[must_use]
    pub fn new(
        id: &ContainerId,
        network: &crate::network::Network,
        ip: Ipv4Addr,
        port_mappings: Vec<PortMapping>,
    ) -> Self {
        let short: String = id.as_str().chars().take(VETH_ID_LEN).collect();
        let octets = ip.octets();
        Self {
            id: format!("{id}-{}", network.name),
            host_veth: format!("{HOST_VETH_PREFIX}{short}"),
            peer_veth: format!("{PEER_VETH_PREFIX}{short}"),
            ip,
            mac: [0x02, 0x42, octets[0], octets[1], octets[2], octets[3]],
            interface_addr: Ipv4Network::new(ip, network.ip_range.prefix())
                .unwrap_or(network.ip_range),
            gateway: network.gateway(),
            network: network.name.clone(),
            port_mappings,
        }
    }
}

/// A `hostPort:containerPort` TCP forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port on the host.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
}

impl PortMapping {
    /// Parses `host:container`; anything else yields `None`.
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        let (host, container) = spec.split_once(':')?;
        Some(Self {
            host: host.parse().ok()?,
            container: container.parse().ok()?,
        })
    }
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}
