//! CPU and memory-node pinning via the cgroup v1 `cpuset` subsystem.

use std::path::{Path, PathBuf};

use hull_common::error::{HullError, Result};

/// Memory node assigned to a container cpuset that inherited none.
const DEFAULT_MEMS: &str = "0";

/// Control files a cpuset needs populated before it accepts tasks or
/// children.
const INHERITED: [&str; 2] = ["cpuset.cpus", "cpuset.mems"];

/// Creates `cgroup_path` under the cpuset hierarchy at `mount_point`.
///
/// A new cpuset starts with empty `cpus` and `mems`, and the kernel only
/// accepts a child's values when they are a subset of its parent's. Every
/// level on the way down therefore gets its empty files filled from its
/// parent, including levels that already existed.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or a control file
/// cannot be copied.
pub fn create_inheriting(mount_point: &Path, cgroup_path: &Path) -> Result<PathBuf> {
    let mut parent = mount_point.to_path_buf();
    for component in cgroup_path.iter().filter(|c| *c != "/") {
        let dir = parent.join(component);
        match std::fs::create_dir(&dir) {
            Ok(()) => tracing::debug!(path = %dir.display(), "cpuset created"),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(HullError::io(dir, e)),
        }
        for name in INHERITED {
            inherit(&parent.join(name), &dir.join(name))?;
        }
        parent = dir;
    }
    Ok(parent)
}

fn inherit(from: &Path, to: &Path) -> Result<()> {
    if !read_trimmed(to)?.is_empty() {
        return Ok(());
    }
    let value = read_trimmed(from)?;
    if value.is_empty() {
        return Ok(());
    }
    std::fs::write(to, &value).map_err(|e| HullError::io(to, e))
}

fn read_trimmed(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(HullError::io(path, e)),
    }
}

/// Restricts a cgroup to the given CPU list (e.g. `0-1` or `0,2`).
///
/// `cpuset.mems` must be populated before tasks can join the cpuset, so an
/// empty one is filled first.
///
/// # Errors
///
/// Returns an error if reading or writing either control file fails.
pub fn set_cpus(cgroup_dir: &Path, cpus: &str) -> Result<()> {
    let mems = cgroup_dir.join("cpuset.mems");
    if read_trimmed(&mems)?.is_empty() {
        std::fs::write(&mems, DEFAULT_MEMS).map_err(|e| HullError::io(mems, e))?;
    }

    let file = cgroup_dir.join("cpuset.cpus");
    std::fs::write(&file, cpus).map_err(|e| HullError::io(file, e))?;
    tracing::info!(cpus, "cpuset set");
    Ok(())
}
