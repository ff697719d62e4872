//! Network records and the registry persisting them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hull_common::error::{HullError, Result};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

/// A named virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Unique network name, also used as the bridge device name.
    pub name: String,
    /// Gateway address with the subnet prefix, e.g. `192.168.10.1/24`.
    pub ip_range: Ipv4Network,
    /// Name of the driver that owns the network's devices.
    pub driver: String,
}

impl Network {
    /// Returns the gateway address.
    #[must_use]
    pub fn gateway(&self) -> std::net::Ipv4Addr {
        self.ip_range.ip()
    }

    /// Returns the masked subnet, e.g. `192.168.10.0/24`.
    #[must_use]
    pub fn subnet(&self) -> Ipv4Network {
        Ipv4Network::new(self.ip_range.network(), self.ip_range.prefix()).unwrap_or(self.ip_range)
    }
}

/// In-memory view of every network, backed by one JSON file per network.
#[derive(Debug)]
pub struct NetworkRegistry {
    dir: PathBuf,
    networks: BTreeMap<String, Network>,
}

impl NetworkRegistry {
    /// Loads every network record under `dir`, creating `dir` if needed.
    ///
    /// Unreadable records are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created or listed.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| HullError::io(&dir, e))?;

        let mut networks = BTreeMap::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| HullError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| HullError::io(&dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            match read_record(&path) {
                Ok(network) => {
                    let _ = networks.insert(network.name.clone(), network);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping network record"),
            }
        }
        tracing::debug!(count = networks.len(), "networks loaded");
        Ok(Self { dir, networks })
    }

    /// Looks up a network by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    /// Returns `true` if a network named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.networks.contains_key(name)
    }

    /// Iterates over networks in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Persists `network` and adds it to the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn insert(&mut self, network: Network) -> Result<()> {
        let path = self.dir.join(&network.name);
        let data = serde_json::to_string_pretty(&network)?;
        std::fs::write(&path, data).map_err(|e| HullError::io(&path, e))?;
        let _ = self.networks.insert(network.name.clone(), network);
        Ok(())
    }

    /// Removes the network record named `name`, returning it if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the record file exists but cannot be removed.
    pub fn remove(&mut self, name: &str) -> Result<Option<Network>> {
        let path = self.dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(HullError::io(path, e)),
        }
        Ok(self.networks.remove(name))
    }
}

fn read_record(path: &Path) -> Result<Network> {
    let data = std::fs::read_to_string(path).map_err(|e| HullError::io(path, e))?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Network {
        Network {
            name: name.into(),
            ip_range: "192.168.10.1/24".parse().unwrap(),
            driver: "bridge".into(),
        }
    }

    #[test]
    fn gateway_and_subnet_split_ip_range() {
        let network = sample("testnet");
        assert_eq!(network.gateway(), std::net::Ipv4Addr::new(192, 168, 10, 1));
        assert_eq!(network.subnet().to_string(), "192.168.10.0/24");
    }

    #[test]
    fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = NetworkRegistry::load(dir.path()).unwrap();
        registry.insert(sample("alpha")).unwrap();
        registry.insert(sample("beta")).unwrap();

        let reloaded = NetworkRegistry::load(dir.path()).unwrap();
        let names: Vec<_> = reloaded.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta"]);
        assert_eq!(reloaded.get("alpha"), Some(&sample("alpha")));
    }

    #[test]
    fn corrupt_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken"), "{not json").unwrap();
        let mut registry = NetworkRegistry::load(dir.path()).unwrap();
        registry.insert(sample("good")).unwrap();

        let reloaded = NetworkRegistry::load(dir.path()).unwrap();
        assert!(reloaded.contains("good"));
        assert!(!reloaded.contains("broken"));
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = NetworkRegistry::load(dir.path()).unwrap();
        registry.insert(sample("gone")).unwrap();
        assert_eq!(registry.remove("gone").unwrap(), Some(sample("gone")));
        assert!(!dir.path().join("gone").exists());
        assert_eq!(registry.remove("gone").unwrap(), None);
    }
}
