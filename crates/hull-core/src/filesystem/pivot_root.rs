//! Root filesystem switching via `pivot_root(2)`.
//!
//! The new root must be a mount point, so it is bind-mounted onto itself
//! first. The old root is parked in `pivot.old`, detached and removed.

use std::path::Path;

use hull_common::error::{HullError, Result};

/// Directory under the new root that temporarily holds the old root.
pub const PUT_OLD: &str = "pivot.old";

/// Makes `new_root` the root filesystem of the calling process.
///
/// Must run inside a private mount namespace.
///
/// # Errors
///
/// Returns an error if any mount, `pivot_root(2)` or cleanup step fails.
#[cfg(target_os = "linux")]
pub fn pivot_root(new_root: &Path) -> Result<()> {
    use nix::mount::{MntFlags, MsFlags, mount, umount2};

    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| HullError::kernel("bind mount new root", e))?;

    let put_old = new_root.join(PUT_OLD);
    std::fs::create_dir_all(&put_old).map_err(|e| HullError::io(&put_old, e))?;

    nix::unistd::pivot_root(new_root, &put_old)
        .map_err(|e| HullError::kernel("pivot_root", e))?;
    nix::unistd::chdir("/").map_err(|e| HullError::kernel("chdir /", e))?;

    let old = Path::new("/").join(PUT_OLD);
    umount2(&old, MntFlags::MNT_DETACH).map_err(|e| HullError::kernel("umount old root", e))?;
    std::fs::remove_dir(&old).map_err(|e| HullError::io(&old, e))?;

    tracing::debug!(new_root = %new_root.display(), "pivoted root");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; `pivot_root` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn pivot_root(_new_root: &Path) -> Result<()> {
    Err(HullError::Config {
        message: "Linux required for native container operations".into(),
    })
}
