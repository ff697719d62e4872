//! CPU share control via the cgroup v1 `cpu` subsystem.
//!
//! Manages `cpu.shares`, the relative weight a cgroup receives under
//! contention.

use std::path::Path;

use hull_common::error::{HullError, Result};

/// Writes the CPU share weight for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `cpu.shares` fails.
pub fn set_shares(cgroup_dir: &Path, shares: &str) -> Result<()> {
    let file = cgroup_dir.join("cpu.shares");
    std::fs::write(&file, shares).map_err(|e| HullError::io(file, e))?;
    tracing::info!(shares, "cpu shares set");
    Ok(())
}
