//! Cgroup v1 resource management.
//!
//! A [`CgroupManager`] owns one cgroup path and fans each operation out to
//! its subsystems. Subsystems are independent: a failure in one is logged
//! and collected, and the remaining subsystems are still attempted.

pub mod cpu;
pub mod cpuset;
pub mod hierarchy;
pub mod memory;
pub mod subsystem;

use std::path::{Path, PathBuf};

use hull_common::error::{Failures, Result};
use hull_common::types::ResourceConfig;

pub use hierarchy::Hierarchy;
pub use subsystem::Subsystem;

/// Handle to a container's cgroup across all managed subsystems.
#[derive(Debug, Clone)]
pub struct CgroupManager {
    /// Cgroup path relative to each hierarchy's mount point.
    path: PathBuf,
    hierarchy: Hierarchy,
    subsystems: Vec<Subsystem>,
}

impl CgroupManager {
    /// Creates a manager for `path` covering every subsystem.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hierarchy: Hierarchy::default(),
            subsystems: Subsystem::ALL.to_vec(),
        }
    }

    /// Resolves hierarchies through `hierarchy` instead of the live mount table.
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Restricts the manager to the given subsystems.
    #[must_use]
    pub fn with_subsystems(mut self, subsystems: Vec<Subsystem>) -> Self {
        self.subsystems = subsystems;
        self
    }

    /// Returns the cgroup path managed by this handle.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds `pid` to the cgroup of every subsystem `res` configures.
    pub fn apply(&self, pid: u32, res: &ResourceConfig) -> Failures {
        self.each("apply", |s| s.apply(&self.hierarchy, &self.path, pid, res))
    }

    /// Writes the limits in `res` to every subsystem.
    pub fn set(&self, res: &ResourceConfig) -> Failures {
        self.each("set", |s| s.set(&self.hierarchy, &self.path, res))
    }

    /// Removes the cgroup directory from every subsystem.
    pub fn destroy(&self) -> Failures {
        let failures = self.each("destroy", |s| s.remove(&self.hierarchy, &self.path));
        if failures.is_empty() {
            tracing::info!(path = %self.path.display(), "cgroup destroyed");
        }
        failures
    }

    fn each(&self, op: &str, mut f: impl FnMut(Subsystem) -> Result<()>) -> Failures {
        let mut failures = Failures::new();
        for &subsystem in &self.subsystems {
            if let Err(e) = f(subsystem) {
                tracing::warn!(%subsystem, op, error = %e, "cgroup operation failed");
                failures.push(e);
            }
        }
        failures
    }
}
