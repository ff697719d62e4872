//! Memory resource control via the cgroup v1 `memory` subsystem.

use std::path::Path;

use hull_common::error::{HullError, Result};

/// Sets the hard memory limit for a cgroup.
///
/// The value is written verbatim, so kernel suffixes (`100m`, `1g`) are
/// accepted.
///
/// # Errors
///
/// Returns an error if writing to `memory.limit_in_bytes` fails.
pub fn set_limit(cgroup_dir: &Path, limit: &str) -> Result<()> {
    let file = cgroup_dir.join("memory.limit_in_bytes");
    std::fs::write(&file, limit).map_err(|e| HullError::io(file, e))?;
    tracing::info!(limit, "memory limit set");
    Ok(())
}
