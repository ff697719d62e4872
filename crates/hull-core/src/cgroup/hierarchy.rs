//! Discovery of cgroup v1 hierarchies through `/proc/self/mountinfo`.
//!
//! Each v1 subsystem is mounted on its own hierarchy. The mount point is the
//! fifth field of the mountinfo line whose super options (the last field)
//! contain the subsystem name.

use std::path::{Path, PathBuf};

use hull_common::error::{HullError, Result};

/// Default location of the mount table for the calling process.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Index of the mount point field in a mountinfo line.
const MOUNT_POINT_FIELD: usize = 4;

/// Resolves subsystem directories from a mountinfo table.
///
/// The table is re-read on every call, so the resolver holds no mount state.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    mountinfo: PathBuf,
}

impl Hierarchy {
    /// Resolver reading an alternative mountinfo file.
    #[must_use]
    pub fn with_mountinfo(mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: mountinfo.into(),
        }
    }

    /// Returns the mount point of the hierarchy carrying `subsystem`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mountinfo table cannot be read or no cgroup
    /// mount lists `subsystem` among its options.
    pub fn mount_point(&self, subsystem: &str) -> Result<PathBuf> {
        let table = std::fs::read_to_string(&self.mountinfo)
            .map_err(|e| HullError::io(&self.mountinfo, e))?;
        find_mount_point(&table, subsystem).ok_or_else(|| HullError::NotFound {
            kind: "cgroup hierarchy",
            id: subsystem.to_string(),
        })
    }

    /// Returns the absolute directory of `cgroup_path` under `subsystem`.
    ///
    /// With `auto_create` the directory is created when missing; without it a
    /// missing directory is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the hierarchy cannot be found, or the directory is
    /// missing and cannot (or may not) be created.
    pub fn subsystem_path(
        &self,
        subsystem: &str,
        cgroup_path: &Path,
        auto_create: bool,
    ) -> Result<PathBuf> {
        let path = self.mount_point(subsystem)?.join(cgroup_path);
        if path.is_dir() {
            return Ok(path);
        }
        if !auto_create {
            return Err(HullError::NotFound {
                kind: "cgroup",
                id: path.display().to_string(),
            });
        }
        std::fs::create_dir_all(&path).map_err(|e| HullError::io(&path, e))?;
        tracing::debug!(subsystem, path = %path.display(), "cgroup created");
        Ok(path)
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::with_mountinfo(MOUNTINFO_PATH)
    }
}

/// Finds the mount point whose super options name `subsystem` exactly.
#[must_use]
pub fn find_mount_point(table: &str, subsystem: &str) -> Option<PathBuf> {
    table.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(' ').collect();
        let options = fields.last()?;
        if options.split(',').any(|opt| opt == subsystem) {
            fields.get(MOUNT_POINT_FIELD).map(PathBuf::from)
        } else {
            None
        }
    })
}
