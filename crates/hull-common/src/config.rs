//! Global configuration model for the hull runtime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::layout::Layout;

/// Root configuration for the hull runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullConfig {
    /// Base directory for all runtime state, layers, and network records.
    pub root_dir: PathBuf,
    /// Cgroup directory under which each container gets its own cgroup.
    pub cgroup_parent: String,
}

impl HullConfig {
    /// Creates a configuration rooted at `root_dir` with default cgroup parent.
    #[must_use]
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Returns the path layout derived from `root_dir`.
    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout::new(&self.root_dir)
    }

    /// Returns the cgroup path for a container.
    #[must_use]
    pub fn cgroup_path(&self, container_id: &str) -> PathBuf {
        PathBuf::from(&self.cgroup_parent).join(container_id)
    }
}

impl Default for HullConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(crate::constants::DEFAULT_ROOT_DIR),
            cgroup_parent: crate::constants::DEFAULT_CGROUP_PARENT.to_string(),
        }
    }
}
