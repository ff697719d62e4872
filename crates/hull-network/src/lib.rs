//! # hull-network
//!
//! Container networking for the hull runtime.
//!
//! - **IPAM**: per-subnet bitmap allocation persisted as JSON.
//! - **Registry**: one JSON record per named network.
//! - **Drivers**: the bridge driver wires bridges and veth pairs over
//!   rtnetlink and installs iptables NAT rules.
//! - **Manager**: ties the three together for create, connect, disconnect
//!   and delete.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod driver;
pub mod endpoint;
pub mod firewall;
pub mod ipam;
pub mod manager;
pub mod netlink;
pub mod network;

pub use driver::NetworkDriver;
pub use manager::NetworkManager;
pub use network::Network;
