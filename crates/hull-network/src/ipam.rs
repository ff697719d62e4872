//! Bitmap IP address allocation persisted to a JSON table.
//!
//! Each subnet maps to a string of `'0'`/`'1'` flags, one per host offset.
//! Offset `i` stands for address `network + i + 1`. The table is loaded in
//! full before every operation and rewritten in full after every change.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use hull_common::error::{HullError, Result};
use ipnetwork::Ipv4Network;

/// Offsets at the end of every bitmap that are never handed out: the
/// broadcast address and the first address past the subnet.
const RESERVED_TAIL: usize = 2;

type Table = BTreeMap<String, String>;

/// File-backed IP allocator.
#[derive(Debug, Clone)]
pub struct Ipam {
    path: PathBuf,
}

impl Ipam {
    /// Creates an allocator persisting its table at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the table location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Allocates the lowest free address in `subnet`.
    ///
    /// # Errors
    ///
    /// Returns [`HullError::Exhausted`] when every address is taken, or an
    /// I/O or serialization error if the table cannot be read or written.
    pub fn allocate(&self, subnet: Ipv4Network) -> Result<Ipv4Addr> {
        let key = subnet_key(subnet);
        let mut table = self.load()?;
        let bitmap = table
            .entry(key.clone())
            .or_insert_with(|| "0".repeat(bitmap_len(subnet)));

        let usable = bitmap.len().saturating_sub(RESERVED_TAIL);
        let Some(offset) = bitmap.bytes().take(usable).position(|b| b == b'0') else {
            return Err(HullError::Exhausted { subnet: key });
        };
        bitmap.replace_range(offset..=offset, "1");

        let ip = offset_to_ip(subnet, offset);
        self.dump(&table)?;
        tracing::debug!(subnet = %key, %ip, "address allocated");
        Ok(ip)
    }

    /// Returns `ip` to the free pool of `subnet`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ip` does not belong to `subnet`, or the table
    /// cannot be read or written.
    pub fn release(&self, subnet: Ipv4Network, ip: Ipv4Addr) -> Result<()> {
        let key = subnet_key(subnet);
        let mut table = self.load()?;
        let bitmap = table
            .entry(key.clone())
            .or_insert_with(|| "0".repeat(bitmap_len(subnet)));

        let offset = ip_to_offset(subnet, ip)
            .filter(|&o| o < bitmap.len())
            .ok_or_else(|| HullError::Config {
                message: format!("address {ip} is not allocatable in {key}"),
            })?;
        bitmap.replace_range(offset..=offset, "0");

        self.dump(&table)?;
        tracing::debug!(subnet = %key, %ip, "address released");
        Ok(())
    }

    /// Forgets every allocation in `subnet`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or written.
    pub fn delete(&self, subnet: Ipv4Network) -> Result<()> {
        let key = subnet_key(subnet);
        let mut table = self.load()?;
        if table.remove(&key).is_some() {
            self.dump(&table)?;
            tracing::debug!(subnet = %key, "subnet removed from allocator");
        }
        Ok(())
    }

    fn load(&self) -> Result<Table> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::new()),
            Err(e) => Err(HullError::io(&self.path, e)),
        }
    }

    fn dump(&self, table: &Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HullError::io(parent, e))?;
        }
        let data = serde_json::to_string(table)?;
        std::fs::write(&self.path, data).map_err(|e| HullError::io(&self.path, e))
    }
}

/// Canonical table key: the masked network in CIDR notation.
#[must_use]
pub fn subnet_key(subnet: Ipv4Network) -> String {
    format!("{}/{}", subnet.network(), subnet.prefix())
}

fn bitmap_len(subnet: Ipv4Network) -> usize {
    1usize << (32 - u32::from(subnet.prefix()))
}

fn offset_to_ip(subnet: Ipv4Network, offset: usize) -> Ipv4Addr {
    let base = u32::from(subnet.network());
    #[allow(clippy::cast_possible_truncation)]
    let offset = offset as u32;
    Ipv4Addr::from(base.wrapping_add(offset).wrapping_add(1))
}

fn ip_to_offset(subnet: Ipv4Network, ip: Ipv4Addr) -> Option<usize> {
    let base = u32::from(subnet.network());
    let offset = u32::from(ip).checked_sub(base)?.checked_sub(1)?;
    usize::try_from(offset).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Ipam) {
        let dir = tempfile::tempdir().unwrap();
        let ipam = Ipam::new(dir.path().join("ipam").join("subnet.json"));
        (dir, ipam)
    }

    fn net(cidr: &str) -> Ipv4Network {
        cidr.parse().unwrap()
    }

    fn bitmap(ipam: &Ipam, key: &str) -> String {
        ipam.load().unwrap().get(key).cloned().unwrap_or_default()
    }

    #[test]
    fn allocates_sequentially_from_first_host() {
        let (_dir, ipam) = setup();
        let subnet = net("192.168.1.0/24");
        assert_eq!(ipam.allocate(subnet).unwrap(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(ipam.allocate(subnet).unwrap(), Ipv4Addr::new(192, 168, 1, 2));
    }

    #[test]
    fn bitmap_covers_whole_subnet() {
        let (_dir, ipam) = setup();
        ipam.allocate(net("10.0.0.0/24")).unwrap();
        let map = bitmap(&ipam, "10.0.0.0/24");
        assert_eq!(map.len(), 256);
        assert!(map.starts_with("10"));
    }

    #[test]
    fn unmasked_subnet_shares_key() {
        let (_dir, ipam) = setup();
        ipam.allocate(net("10.1.0.1/24")).unwrap();
        assert_eq!(
            ipam.allocate(net("10.1.0.0/24")).unwrap(),
            Ipv4Addr::new(10, 1, 0, 2)
        );
    }

    #[test]
    fn release_restores_bitmap() {
        let (_dir, ipam) = setup();
        let subnet = net("172.16.0.0/28");
        ipam.allocate(subnet).unwrap();
        let before = bitmap(&ipam, "172.16.0.0/28");
        let ip = ipam.allocate(subnet).unwrap();
        ipam.release(subnet, ip).unwrap();
        assert_eq!(bitmap(&ipam, "172.16.0.0/28"), before);
    }

    #[test]
    fn released_address_is_reused_first() {
        let (_dir, ipam) = setup();
        let subnet = net("172.16.0.0/28");
        let first = ipam.allocate(subnet).unwrap();
        let _second = ipam.allocate(subnet).unwrap();
        ipam.release(subnet, first).unwrap();
        assert_eq!(ipam.allocate(subnet).unwrap(), first);
    }

    #[test]
    fn no_duplicates_until_exhausted() {
        let (_dir, ipam) = setup();
        let subnet = net("10.9.0.0/29");
        let mut seen = std::collections::HashSet::new();
        loop {
            match ipam.allocate(subnet) {
                Ok(ip) => assert!(seen.insert(ip), "{ip} handed out twice"),
                Err(HullError::Exhausted { subnet }) => {
                    assert_eq!(subnet, "10.9.0.0/29");
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(seen.len(), 6);
        assert!(!seen.contains(&Ipv4Addr::new(10, 9, 0, 7)));
    }

    #[test]
    fn tiny_subnet_exhausts_with_error() {
        let (_dir, ipam) = setup();
        let subnet = net("10.0.0.0/30");
        assert_eq!(ipam.allocate(subnet).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ipam.allocate(subnet).unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert!(matches!(ipam.allocate(subnet), Err(HullError::Exhausted { .. })));
    }

    #[test]
    fn release_rejects_foreign_address() {
        let (_dir, ipam) = setup();
        let subnet = net("10.0.0.0/24");
        ipam.allocate(subnet).unwrap();
        assert!(ipam.release(subnet, Ipv4Addr::new(10, 0, 0, 0)).is_err());
        assert!(ipam.release(subnet, Ipv4Addr::new(10, 0, 1, 5)).is_err());
    }

    #[test]
    fn delete_drops_subnet_entry() {
        let (_dir, ipam) = setup();
        let a = net("10.0.0.0/24");
        let b = net("10.0.1.0/24");
        ipam.allocate(a).unwrap();
        ipam.allocate(b).unwrap();
        ipam.delete(a).unwrap();
        let table = ipam.load().unwrap();
        assert!(!table.contains_key("10.0.0.0/24"));
        assert!(table.contains_key("10.0.1.0/24"));
        assert_eq!(ipam.allocate(a).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn missing_table_is_empty() {
        let (_dir, ipam) = setup();
        assert!(ipam.load().unwrap().is_empty());
        ipam.delete(net("10.0.0.0/24")).unwrap();
        assert!(!ipam.path().exists());
    }
}
