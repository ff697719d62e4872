//! Mount setup performed by the container init process.
//!
//! Handles mount propagation, the root switch, and the `/proc` and `/dev`
//! pseudo-filesystems inside the container's mount namespace.

use hull_common::error::{HullError, Result};

/// Stops mount events in this namespace from propagating back to the host.
///
/// # Errors
///
/// Returns an error if the remount fails.
#[cfg(target_os = "linux")]
pub fn make_root_private() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| HullError::kernel("make / private", e))
}

/// Mounts a restricted `proc` at `/proc`.
///
/// # Errors
///
/// Returns an error if the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_proc() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    std::fs::create_dir_all("/proc").map_err(|e| HullError::io("/proc", e))?;
    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| HullError::kernel("mount /proc", e))
}

/// Mounts a `tmpfs` at `/dev` with mode 755.
///
/// # Errors
///
/// Returns an error if the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_dev() -> Result<()> {
    use nix::mount::{MsFlags, mount};

    std::fs::create_dir_all("/dev").map_err(|e| HullError::io("/dev", e))?;
    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755"),
    )
    .map_err(|e| HullError::kernel("mount /dev", e))
}

/// Turns the current working directory into the container root.
///
/// Order matters: propagation is cut first, then the root is switched, and
/// only then are the pseudo-filesystems mounted inside the new root.
///
/// # Errors
///
/// Returns an error if any step fails; the container cannot start.
#[cfg(target_os = "linux")]
pub fn setup_container_root() -> Result<()> {
    use super::pivot_root::pivot_root;

    let root = std::env::current_dir().map_err(|e| HullError::io(".", e))?;
    tracing::debug!(root = %root.display(), "setting up container root");

    make_root_private()?;
    pivot_root(&root)?;
    mount_proc()?;
    mount_dev()?;
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; container mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn setup_container_root() -> Result<()> {
    Err(HullError::Config {
        message: "Linux required for native container operations".into(),
    })
}
