//! Persistent container records.
//!
//! Each container's record lives at `containers/<name>/config.json`,
//! enabling daemon-less lifecycle management across CLI invocations.

use hull_common::error::{HullError, Result};
use hull_common::layout::Layout;
use hull_common::types::ContainerRecord;

/// File-backed store of container records keyed by name.
#[derive(Debug, Clone)]
pub struct RecordStore {
    layout: Layout,
}

impl RecordStore {
    /// Creates a store rooted at `layout`.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Returns `true` if a record exists for `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.layout.config_file(name).is_file()
    }

    /// Writes `record`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn save(&self, record: &ContainerRecord) -> Result<()> {
        let dir = self.layout.container_dir(&record.name);
        std::fs::create_dir_all(&dir).map_err(|e| HullError::io(&dir, e))?;
        let path = self.layout.config_file(&record.name);
        let data = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, data).map_err(|e| HullError::io(&path, e))?;
        tracing::debug!(path = %path.display(), status = %record.status, "record saved");
        Ok(())
    }

    /// Loads the record of container `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HullError::NotFound`] if no record exists, or an error if it
    /// cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<ContainerRecord> {
        let path = self.layout.config_file(name);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HullError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(HullError::io(path, e)),
        };
        Ok(serde_json::from_str(&data)?)
    }

    /// Loads every record, sorted by creation time.
    ///
    /// Unreadable records are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the containers directory exists but cannot be
    /// listed.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let dir = self.layout.containers_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HullError::io(dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HullError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load(&name) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(container = %name, error = %e, "skipping container record"),
            }
        }
        records.sort_by(|a, b| a.created_time.cmp(&b.created_time).then(a.name.cmp(&b.name)));
        Ok(records)
    }

    /// Removes the record directory of container `name`, log included.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.layout.container_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HullError::io(dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use hull_common::types::{ContainerId, ContainerStatus};

    use super::*;

    fn record(name: &str, created: &str) -> ContainerRecord {
        ContainerRecord {
            id: ContainerId::new(format!("id-{name}")),
            name: name.into(),
            pid: Some(10),
            command: "sh".into(),
            created_time: created.into(),
            status: ContainerStatus::Running,
            volume: None,
            image: "busybox".into(),
            network: None,
            port_mappings: Vec::new(),
            ip_address: None,
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(Layout::new(dir.path()));
        let rec = record("c1", "2024-01-01 00:00:00");
        store.save(&rec).unwrap();
        assert!(store.exists("c1"));
        assert_eq!(store.load("c1").unwrap(), rec);
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(Layout::new(dir.path()));
        assert!(matches!(
            store.load("ghost"),
            Err(HullError::NotFound { kind: "container", .. })
        ));
    }

    #[test]
    fn list_orders_by_creation_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let store = RecordStore::new(layout.clone());
        store.save(&record("late", "2024-01-02 00:00:00")).unwrap();
        store.save(&record("early", "2024-01-01 00:00:00")).unwrap();
        std::fs::create_dir_all(layout.container_dir("junk")).unwrap();
        std::fs::write(layout.config_file("junk"), "not json").unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["early", "late"]);
    }

    #[test]
    fn list_without_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(Layout::new(dir.path().join("nowhere")));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let store = RecordStore::new(layout.clone());
        store.save(&record("c1", "now")).unwrap();
        store.delete("c1").unwrap();
        assert!(!layout.container_dir("c1").exists());
        store.delete("c1").unwrap();
    }
}
