//! Network lifecycle: creation, container attachment and removal.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use hull_common::constants::MAX_IFNAME_LEN;
use hull_common::error::{Failures, HullError, Result};
use hull_common::layout::Layout;
use hull_common::types::ContainerRecord;
use hull_core::namespace::network::open_netns;
use ipnetwork::Ipv4Network;

use crate::driver::{BridgeDriver, NetworkDriver};
use crate::endpoint::{Endpoint, PortMapping};
use crate::ipam::Ipam;
use crate::network::{Network, NetworkRegistry};

/// Smallest accepted prefix; larger subnets make the allocation table huge.
const MIN_PREFIX: u8 = 8;
/// Largest accepted prefix; anything longer leaves no room for containers.
const MAX_PREFIX: u8 = 30;

/// Coordinates the registry, the allocator and the drivers.
pub struct NetworkManager {
    registry: NetworkRegistry,
    ipam: Ipam,
    drivers: HashMap<String, Box<dyn NetworkDriver>>,
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("registry", &self.registry)
            .field("ipam", &self.ipam)
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NetworkManager {
    /// Loads persisted networks and registers the bridge driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the network registry cannot be loaded.
    pub fn init(layout: &Layout) -> Result<Self> {
        Self::with_drivers(layout, vec![Box::new(BridgeDriver)])
    }

    /// Loads persisted networks and registers `drivers` by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the network registry cannot be loaded.
    pub fn with_drivers(layout: &Layout, drivers: Vec<Box<dyn NetworkDriver>>) -> Result<Self> {
        let registry = NetworkRegistry::load(layout.networks_dir())?;
        let drivers = drivers
            .into_iter()
            .map(|d| (d.name().to_string(), d))
            .collect();
        Ok(Self {
            registry,
            ipam: Ipam::new(layout.ipam_file()),
            drivers,
        })
    }

    /// Iterates over every known network in name order.
    pub fn list_networks(&self) -> impl Iterator<Item = &Network> {
        self.registry.iter()
    }

    /// Looks up a network by name.
    #[must_use]
    pub fn network(&self, name: &str) -> Option<&Network> {
        self.registry.get(name)
    }

    /// Creates network `name` over `subnet` using `driver`.
    ///
    /// The first address of the subnet becomes the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or subnet is invalid or taken, the driver
    /// is unknown, or the driver fails. A failed driver releases the gateway.
    pub fn create_network(&mut self, driver: &str, subnet: &str, name: &str) -> Result<Network> {
        validate_name(name)?;
        if self.registry.contains(name) {
            return Err(HullError::Config {
                message: format!("network {name} already exists"),
            });
        }
        let subnet = parse_subnet(subnet)?;
        let driver_impl = self.driver(driver)?;

        let gateway = self.ipam.allocate(subnet)?;
        let network = Network {
            name: name.to_string(),
            ip_range: Ipv4Network::new(gateway, subnet.prefix())
                .map_err(|e| HullError::Config {
                    message: e.to_string(),
                })?,
            driver: driver.to_string(),
        };
        if let Err(e) = driver_impl.create(&network) {
            self.release(subnet, gateway);
            return Err(e);
        }
        self.registry.insert(network.clone())?;
        tracing::info!(network = name, subnet = %subnet, %gateway, "network created");
        Ok(network)
    }

    /// Removes network `name`: its allocations, devices and record.
    ///
    /// Every step is attempted. The record is dropped even when releasing
    /// the subnet or the devices fails, so a network whose bridge is
    /// already gone can still be removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown, the record cannot be
    /// removed, or otherwise the first failed cleanup step.
    pub fn delete_network(&mut self, name: &str) -> Result<()> {
        let network = self.lookup(name)?.clone();
        let released = self.ipam.delete(network.subnet());
        let devices = self
            .driver(&network.driver)
            .and_then(|driver| driver.delete(&network));
        for err in [&released, &devices].into_iter().filter_map(|r| r.as_ref().err()) {
            tracing::warn!(network = name, error = %err, "network cleanup step failed");
        }
        let _ = self.registry.remove(name)?;
        tracing::info!(network = name, "network removed");
        released.and(devices)
    }

    /// Attaches the running container in `record` to network `name`.
    ///
    /// Malformed port mappings and failed DNAT rules are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the network or container process is unknown, no
    /// address is left, or the endpoint cannot be wired. Partial wiring and
    /// the allocated address are undone before returning.
    pub fn connect(&self, name: &str, record: &ContainerRecord) -> Result<Ipv4Addr> {
        let network = self.lookup(name)?;
        let pid = record.pid.ok_or_else(|| HullError::InvalidState {
            message: format!("container {} has no running process", record.name),
        })?;
        let driver = self.driver(&network.driver)?;
        let netns = open_netns(pid)?;

        let subnet = network.subnet();
        let ip = self.ipam.allocate(subnet)?;
        let endpoint = Endpoint::new(&record.id, network, ip, parse_mappings(&record.port_mappings));

        if let Err(e) = driver.connect(network, &endpoint) {
            self.release(subnet, ip);
            return Err(e);
        }
        if let Err(e) = driver.configure_endpoint(&endpoint, &netns) {
            if let Err(cleanup) = driver.disconnect(&endpoint) {
                tracing::warn!(endpoint = %endpoint.id, error = %cleanup, "veth cleanup failed");
            }
            self.release(subnet, ip);
            return Err(e);
        }

        for &mapping in &endpoint.port_mappings {
            if let Err(e) = driver.expose_port(&endpoint, mapping) {
                tracing::warn!(%mapping, error = %e, "port mapping failed");
            }
        }
        tracing::info!(endpoint = %endpoint.id, %ip, "container connected");
        Ok(ip)
    }

    /// Detaches the container in `record` from network `name`.
    ///
    /// Removes its DNAT rules and veth pair and releases its address. Every
    /// step is attempted; failures are logged and returned.
    pub fn disconnect(&self, name: &str, record: &ContainerRecord) -> Failures {
        let mut failures = Failures::new();
        let (network, driver) = match self.lookup(name).and_then(|n| Ok((n, self.driver(&n.driver)?))) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(network = name, error = %e, "disconnect skipped");
                failures.push(e);
                return failures;
            }
        };
        let Some(ip) = record.ip_address else {
            tracing::debug!(container = %record.name, "no address recorded, nothing to disconnect");
            return failures;
        };

        let endpoint = Endpoint::new(&record.id, network, ip, parse_mappings(&record.port_mappings));
        for &mapping in &endpoint.port_mappings {
            if let Err(e) = driver.unexpose_port(&endpoint, mapping) {
                tracing::warn!(%mapping, error = %e, "port mapping removal failed");
                failures.push(e);
            }
        }
        if let Err(e) = driver.disconnect(&endpoint) {
            tracing::warn!(endpoint = %endpoint.id, error = %e, "veth removal failed");
            failures.push(e);
        }
        if let Err(e) = self.ipam.release(network.subnet(), ip) {
            tracing::warn!(%ip, error = %e, "address release failed");
            failures.push(e);
        }
        if failures.is_empty() {
            tracing::info!(endpoint = %endpoint.id, "container disconnected");
        }
        failures
    }

    fn lookup(&self, name: &str) -> Result<&Network> {
        self.registry.get(name).ok_or_else(|| HullError::NotFound {
            kind: "network",
            id: name.to_string(),
        })
    }

    fn driver(&self, name: &str) -> Result<&dyn NetworkDriver> {
        self.drivers
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| HullError::NotFound {
                kind: "network driver",
                id: name.to_string(),
            })
    }

    fn release(&self, subnet: Ipv4Network, ip: Ipv4Addr) {
        if let Err(e) = self.ipam.release(subnet, ip) {
            tracing::warn!(%ip, error = %e, "address release failed");
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_IFNAME_LEN || name.contains(['/', ' ', ':']) {
        return Err(HullError::Config {
            message: format!(
                "network name {name:?} must be 1-{MAX_IFNAME_LEN} characters without '/', ':' or spaces"
            ),
        });
    }
    Ok(())
}

fn parse_subnet(subnet: &str) -> Result<Ipv4Network> {
    let parsed: Ipv4Network = subnet.parse().map_err(|e| HullError::Config {
        message: format!("invalid subnet {subnet}: {e}"),
    })?;
    if !(MIN_PREFIX..=MAX_PREFIX).contains(&parsed.prefix()) {
        return Err(HullError::Config {
            message: format!("subnet prefix must be between /{MIN_PREFIX} and /{MAX_PREFIX}"),
        });
    }
    Ipv4Network::new(parsed.network(), parsed.prefix()).map_err(|e| HullError::Config {
        message: e.to_string(),
    })
}

fn parse_mappings(specs: &[String]) -> Vec<PortMapping> {
    specs
        .iter()
        .filter_map(|spec| {
            let parsed = PortMapping::parse(spec);
            if parsed.is_none() {
                tracing::warn!(mapping = %spec, "invalid port mapping, expected hostPort:containerPort");
            }
            parsed
        })
        .collect()
}
