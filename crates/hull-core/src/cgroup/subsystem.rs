//! The resource subsystems a container cgroup can be limited by.

use std::path::Path;

use hull_common::error::{HullError, Result};
use hull_common::types::ResourceConfig;

use super::hierarchy::Hierarchy;
use super::{cpu, cpuset, memory};

/// A cgroup v1 subsystem managed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// CPU and memory-node pinning.
    Cpuset,
    /// Memory limit.
    Memory,
    /// Relative CPU weight.
    CpuShare,
}

impl Subsystem {
    /// Every subsystem, in the order limits are applied.
    pub const ALL: [Self; 3] = [Self::Cpuset, Self::Memory, Self::CpuShare];

    /// Kernel name of the subsystem, as listed in mountinfo options.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpuset => "cpuset",
            Self::Memory => "memory",
            Self::CpuShare => "cpu",
        }
    }

    /// Returns the value this subsystem enforces, if one was requested.
    fn requested(self, res: &ResourceConfig) -> Option<&str> {
        let value = match self {
            Self::Cpuset => res.cpu_set.as_deref(),
            Self::Memory => res.memory_limit.as_deref(),
            Self::CpuShare => res.cpu_share.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Writes the subsystem's limit file(s), creating the cgroup if needed.
    ///
    /// Does nothing when `res` leaves this subsystem unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup cannot be resolved or written.
    pub fn set(self, hierarchy: &Hierarchy, cgroup_path: &Path, res: &ResourceConfig) -> Result<()> {
        let Some(value) = self.requested(res) else {
            return Ok(());
        };
        let dir = match self {
            Self::Cpuset => {
                let mount = hierarchy.mount_point(self.name())?;
                cpuset::create_inheriting(&mount, cgroup_path)?
            }
            Self::Memory | Self::CpuShare => {
                hierarchy.subsystem_path(self.name(), cgroup_path, true)?
            }
        };
        match self {
            Self::Cpuset => cpuset::set_cpus(&dir, value),
            Self::Memory => memory::set_limit(&dir, value),
            Self::CpuShare => cpu::set_shares(&dir, value),
        }
    }

    /// Moves `pid` into this subsystem's cgroup.
    ///
    /// Does nothing when `res` leaves this subsystem unset, since no cgroup
    /// was created for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup does not exist or `tasks` cannot be
    /// written.
    pub fn apply(
        self,
        hierarchy: &Hierarchy,
        cgroup_path: &Path,
        pid: u32,
        res: &ResourceConfig,
    ) -> Result<()> {
        if self.requested(res).is_none() {
            return Ok(());
        }
        let dir = hierarchy.subsystem_path(self.name(), cgroup_path, false)?;
        let tasks = dir.join("tasks");
        std::fs::write(&tasks, pid.to_string()).map_err(|e| HullError::io(tasks, e))?;
        tracing::debug!(subsystem = self.name(), pid, "added process to cgroup");
        Ok(())
    }

    /// Removes this subsystem's cgroup directory.
    ///
    /// A cgroup that was never created is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the hierarchy cannot be found or `rmdir` fails.
    pub fn remove(self, hierarchy: &Hierarchy, cgroup_path: &Path) -> Result<()> {
        let dir = hierarchy.mount_point(self.name())?.join(cgroup_path);
        match std::fs::remove_dir(&dir) {
            Ok(()) => {
                tracing::debug!(subsystem = self.name(), path = %dir.display(), "cgroup removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HullError::io(dir, e)),
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
