//! `OverlayFS` mounts for copy-on-write container roots and volumes.
//!
//! A single read-only lower layer is stacked under a writable upper layer.
//! Mounting goes through the [`Mounter`] trait so workspace logic can be
//! exercised without privileges.

use std::path::{Path, PathBuf};

use hull_common::error::{HullError, Result};

/// Configuration for an `OverlayFS` mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Read-only lower layer.
    pub lower_dir: PathBuf,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by `OverlayFS`.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Returns the mount data string passed to `mount(2)`.
    #[must_use]
    pub fn options(&self) -> String {
        format!(
            "lowerdir={},upperdir={},workdir={}",
            self.lower_dir.display(),
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// Performs overlay mounts and detaches them again.
pub trait Mounter {
    /// Mounts `config` at its merged directory. All directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_overlay(&self, config: &OverlayConfig) -> Result<()>;

    /// Lazily detaches whatever is mounted at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// [`Mounter`] issuing real `mount(2)`/`umount2(2)` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelMounter;

#[cfg(target_os = "linux")]
impl Mounter for KernelMounter {
    fn mount_overlay(&self, config: &OverlayConfig) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        let opts = config.options();
        mount(
            Some("overlay"),
            &config.merged_dir,
            Some("overlay"),
            MsFlags::empty(),
            Some(opts.as_str()),
        )
        .map_err(|e| HullError::kernel("overlay mount", e))?;

        tracing::info!(merged = %config.merged_dir.display(), "overlayfs mounted");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH)
            .map_err(|e| HullError::kernel("umount", e))?;
        tracing::info!(path = %target.display(), "overlayfs unmounted");
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl Mounter for KernelMounter {
    fn mount_overlay(&self, _config: &OverlayConfig) -> Result<()> {
        Err(HullError::Config {
            message: "Linux required for native container operations".into(),
        })
    }

    fn unmount(&self, _target: &Path) -> Result<()> {
        Err(HullError::Config {
            message: "Linux required for native container operations".into(),
        })
    }
}
