//! On-disk path templates.
//!
//! Every directory the runtime touches is derived from a single root so that
//! external tooling can find a container's merged root from its name alone.

use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_NAME, CONTAINER_LOG_FILE};

/// Work sub-directory used by the container root overlay.
pub const WORK_IMAGE: &str = "image";
/// Work sub-directory used by the volume overlay.
pub const WORK_VOLUME: &str = "volume";

/// Path layout rooted at the runtime root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the runtime root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every container's record directory.
    #[must_use]
    pub fn containers_dir(&self) -> PathBuf {
        self.root.join("containers")
    }

    /// Per-container record directory.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.containers_dir().join(name)
    }

    /// Persisted container record.
    #[must_use]
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONFIG_NAME)
    }

    /// Log file receiving a detached container's output.
    #[must_use]
    pub fn log_file(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONTAINER_LOG_FILE)
    }

    /// Read-only image layer shared by every container of `image`.
    #[must_use]
    pub fn image_layer(&self, image: &str) -> PathBuf {
        self.root.join("images").join(image)
    }

    /// Root of a container's private layer tree.
    #[must_use]
    pub fn container_layers(&self, name: &str) -> PathBuf {
        self.root.join("overlay2").join(name)
    }

    /// Writable upper layer of a container.
    #[must_use]
    pub fn write_layer(&self, name: &str) -> PathBuf {
        self.container_layers(name).join("write_layer")
    }

    /// Overlay scratch directory for the given mount (`image` or `volume`).
    #[must_use]
    pub fn work_dir(&self, name: &str, sub: &str) -> PathBuf {
        self.container_layers(name).join("work").join(sub)
    }

    /// Merged mount point, the container's root filesystem.
    #[must_use]
    pub fn merged_dir(&self, name: &str) -> PathBuf {
        self.container_layers(name).join("merged")
    }

    /// Empty lower directory shared by all volume overlays.
    #[must_use]
    pub fn volume_lower_dir(&self) -> PathBuf {
        self.root.join("volumes").join("lowerdir")
    }

    /// Directory holding one record file per network.
    #[must_use]
    pub fn networks_dir(&self) -> PathBuf {
        self.root.join("network").join("networks")
    }

    /// Persisted IPAM allocation table.
    #[must_use]
    pub fn ipam_file(&self) -> PathBuf {
        self.root.join("network").join("ipam").join("subnet.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_dir_is_derived_from_name_only() {
        let layout = Layout::new("/var/lib/hull");
        assert_eq!(
            layout.merged_dir("c1"),
            PathBuf::from("/var/lib/hull/overlay2/c1/merged")
        );
    }

    #[test]
    fn image_layer_lives_outside_container_tree() {
        let layout = Layout::new("/r");
        let image = layout.image_layer("busybox");
        assert!(!image.starts_with(layout.container_layers("busybox")));
    }

    #[test]
    fn work_dirs_are_per_mount() {
        let layout = Layout::new("/r");
        assert_eq!(
            layout.work_dir("c1", WORK_IMAGE),
            PathBuf::from("/r/overlay2/c1/work/image")
        );
        assert_eq!(
            layout.work_dir("c1", WORK_VOLUME),
            PathBuf::from("/r/overlay2/c1/work/volume")
        );
    }

    #[test]
    fn record_and_log_share_container_dir() {
        let layout = Layout::new("/r");
        assert_eq!(layout.config_file("c1"), PathBuf::from("/r/containers/c1/config.json"));
        assert_eq!(layout.log_file("c1"), PathBuf::from("/r/containers/c1/container.log"));
    }
}
