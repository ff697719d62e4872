//! Per-container overlay workspaces.
//!
//! A workspace is the container's private layer tree under
//! `overlay2/<name>`: a fresh write layer and work directory stacked over the
//! shared, read-only image layer and mounted at `merged`. The image layer is
//! never written or removed here.

use std::path::{Path, PathBuf};

use hull_common::error::{Failures, HullError, Result};
use hull_common::layout::{Layout, WORK_IMAGE, WORK_VOLUME};

use super::overlayfs::{KernelMounter, Mounter, OverlayConfig};
use super::volume::VolumeSpec;

/// Directories making up a mounted container root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSet {
    /// Shared read-only image layer.
    pub image_layer: PathBuf,
    /// Per-container writable layer.
    pub write_layer: PathBuf,
    /// Overlay scratch directory for the root mount.
    pub work_dir: PathBuf,
    /// Mounted container root.
    pub merged_dir: PathBuf,
    /// Mount point of the volume overlay, when one was mounted.
    pub volume_target: Option<PathBuf>,
}

/// Builds and tears down container workspaces.
#[derive(Debug, Clone)]
pub struct LayerManager<M: Mounter = KernelMounter> {
    layout: Layout,
    mounter: M,
}

impl LayerManager<KernelMounter> {
    /// Creates a manager issuing real mounts under `layout`.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self::with_mounter(layout, KernelMounter)
    }
}

impl<M: Mounter> LayerManager<M> {
    /// Creates a manager using `mounter` for every mount.
    #[must_use]
    pub fn with_mounter(layout: Layout, mounter: M) -> Self {
        Self { layout, mounter }
    }

    /// Returns the mounter in use.
    #[must_use]
    pub fn mounter(&self) -> &M {
        &self.mounter
    }

    /// Creates and mounts the workspace for container `name`.
    ///
    /// A malformed `volume` spec is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the image layer does not exist, a directory cannot
    /// be created, or a mount fails. A failed volume mount unwinds the root
    /// mount before returning.
    pub fn new_workspace(
        &self,
        volume: Option<&str>,
        image: &str,
        name: &str,
    ) -> Result<LayerSet> {
        let image_layer = self.layout.image_layer(image);
        if !image_layer.is_dir() {
            return Err(HullError::NotFound {
                kind: "image",
                id: image.to_string(),
            });
        }

        let root = OverlayConfig {
            lower_dir: image_layer,
            upper_dir: self.layout.write_layer(name),
            work_dir: self.layout.work_dir(name, WORK_IMAGE),
            merged_dir: self.layout.merged_dir(name),
        };
        let created = [&root.upper_dir, &root.work_dir, &root.merged_dir]
            .into_iter()
            .try_for_each(|dir| create_dir(dir));
        if let Err(e) = created.and_then(|()| self.mounter.mount_overlay(&root)) {
            self.remove_layers(name);
            return Err(e);
        }

        let mut layers = LayerSet {
            image_layer: root.lower_dir,
            write_layer: root.upper_dir,
            work_dir: root.work_dir,
            merged_dir: root.merged_dir,
            volume_target: None,
        };

        let Some(spec) = volume else {
            return Ok(layers);
        };
        let Some(spec) = VolumeSpec::parse(spec) else {
            tracing::warn!(volume = spec, "invalid volume spec, expected hostPath:containerPath");
            return Ok(layers);
        };
        match self.mount_volume(name, &spec, &layers.merged_dir) {
            Ok(target) => {
                layers.volume_target = Some(target);
                Ok(layers)
            }
            Err(e) => {
                let _ = self.delete_workspace(None, name, image);
                Err(e)
            }
        }
    }

    /// Unmounts and removes the workspace of container `name`.
    ///
    /// Every step is attempted; failures are logged and returned.
    pub fn delete_workspace(&self, volume: Option<&str>, name: &str, image: &str) -> Failures {
        let mut failures = Failures::new();
        let merged = self.layout.merged_dir(name);

        let mut volume_mounted = false;
        if let Some(spec) = volume.and_then(VolumeSpec::parse) {
            let target = spec.target_in(&merged);
            if let Err(e) = self.mounter.unmount(&target) {
                tracing::warn!(path = %target.display(), error = %e, "volume unmount failed");
                failures.push(e);
                volume_mounted = true;
            }
        }
        if let Err(e) = self.mounter.unmount(&merged) {
            tracing::warn!(path = %merged.display(), error = %e, "root unmount failed");
            failures.push(e);
        }

        let tree = self.layout.container_layers(name);
        // A live volume mount would expose the host directory to the removal.
        if volume_mounted {
            tracing::warn!(path = %tree.display(), "volume still mounted, keeping layer tree");
            return failures;
        }
        match std::fs::remove_dir_all(&tree) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %tree.display(), error = %e, "layer removal failed");
                failures.push(HullError::io(tree, e));
            }
        }

        if failures.is_empty() {
            tracing::info!(container = name, image, "workspace deleted");
        }
        failures
    }

    fn remove_layers(&self, name: &str) {
        let tree = self.layout.container_layers(name);
        match std::fs::remove_dir_all(&tree) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %tree.display(), error = %e, "layer cleanup failed"),
        }
    }

    fn mount_volume(&self, name: &str, spec: &VolumeSpec, merged: &Path) -> Result<PathBuf> {
        let target = spec.target_in(merged);
        let config = OverlayConfig {
            lower_dir: self.layout.volume_lower_dir(),
            upper_dir: spec.host_path.clone(),
            work_dir: self.layout.work_dir(name, WORK_VOLUME),
            merged_dir: target.clone(),
        };
        for dir in [
            &config.lower_dir,
            &config.upper_dir,
            &config.work_dir,
            &config.merged_dir,
        ] {
            create_dir(dir)?;
        }
        self.mounter.mount_overlay(&config)?;
        tracing::info!(
            host = %spec.host_path.display(),
            target = %target.display(),
            "volume mounted"
        );
        Ok(target)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| HullError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Mount { target: PathBuf, options: String },
        Unmount(PathBuf),
    }

    #[derive(Default)]
    struct RecordingMounter {
        ops: RefCell<Vec<Op>>,
        fail_mount_at: Option<PathBuf>,
    }

    impl Mounter for RecordingMounter {
        fn mount_overlay(&self, config: &OverlayConfig) -> Result<()> {
            if self.fail_mount_at.as_deref() == Some(config.merged_dir.as_path()) {
                return Err(HullError::kernel("overlay mount", "EPERM"));
            }
            self.ops.borrow_mut().push(Op::Mount {
                target: config.merged_dir.clone(),
                options: config.options(),
            });
            Ok(())
        }

        fn unmount(&self, target: &Path) -> Result<()> {
            self.ops.borrow_mut().push(Op::Unmount(target.to_path_buf()));
            Ok(())
        }
    }

    fn setup() -> (tempfile::TempDir, Layout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.image_layer("busybox")).unwrap();
        std::fs::write(layout.image_layer("busybox").join("marker"), "x").unwrap();
        (dir, layout)
    }

    #[test]
    fn missing_image_fails_before_creating_anything() {
        let (_dir, layout) = setup();
        let manager = LayerManager::with_mounter(layout.clone(), RecordingMounter::default());
        let err = manager.new_workspace(None, "alpine", "c1").unwrap_err();
        assert!(matches!(err, HullError::NotFound { kind: "image", .. }));
        assert!(!layout.container_layers("c1").exists());
        assert!(manager.mounter().ops.borrow().is_empty());
    }

    #[test]
    fn workspace_mounts_root_over_image_layer() {
        let (_dir, layout) = setup();
        let manager = LayerManager::with_mounter(layout.clone(), RecordingMounter::default());
        let layers = manager.new_workspace(None, "busybox", "c1").unwrap();

        assert!(layers.write_layer.is_dir());
        assert!(layers.work_dir.is_dir());
        assert!(layers.merged_dir.is_dir());
        assert_eq!(layers.volume_target, None);

        let ops = manager.mounter().ops.borrow();
        assert_eq!(
            *ops,
            vec![Op::Mount {
                target: layout.merged_dir("c1"),
                options: format!(
                    "lowerdir={},upperdir={},workdir={}",
                    layout.image_layer("busybox").display(),
                    layout.write_layer("c1").display(),
                    layout.work_dir("c1", WORK_IMAGE).display()
                ),
            }]
        );
    }

    #[test]
    fn delete_removes_container_tree_and_keeps_image() {
        let (_dir, layout) = setup();
        let manager = LayerManager::with_mounter(layout.clone(), RecordingMounter::default());
        manager.new_workspace(None, "busybox", "c1").unwrap();

        let failures = manager.delete_workspace(None, "c1", "busybox");
        assert!(failures.is_empty());
        assert!(!layout.container_layers("c1").exists());
        assert!(layout.image_layer("busybox").join("marker").is_file());
        assert_eq!(
            manager.mounter().ops.borrow().last(),
            Some(&Op::Unmount(layout.merged_dir("c1")))
        );
    }

    #[test]
    fn volume_is_nested_under_merged() {
        let (dir, layout) = setup();
        let host = dir.path().join("host/data");
        let spec = format!("{}:/data", host.display());
        let manager = LayerManager::with_mounter(layout.clone(), RecordingMounter::default());
        let layers = manager.new_workspace(Some(&spec), "busybox", "c1").unwrap();

        let target = layout.merged_dir("c1").join("data");
        assert_eq!(layers.volume_target.as_deref(), Some(target.as_path()));
        assert!(host.is_dir());

        let ops = manager.mounter().ops.borrow();
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[1],
            Op::Mount {
                target: target.clone(),
                options: format!(
                    "lowerdir={},upperdir={},workdir={}",
                    layout.volume_lower_dir().display(),
                    host.display(),
                    layout.work_dir("c1", WORK_VOLUME).display()
                ),
            }
        );
    }

    #[test]
    fn malformed_volume_adds_no_mount() {
        let (_dir, layout) = setup();
        let manager = LayerManager::with_mounter(layout, RecordingMounter::default());
        let layers = manager
            .new_workspace(Some("onlyonepath"), "busybox", "c1")
            .unwrap();
        assert_eq!(layers.volume_target, None);
        assert_eq!(manager.mounter().ops.borrow().len(), 1);
    }

    #[test]
    fn delete_unmounts_volume_before_root() {
        let (dir, layout) = setup();
        let spec = format!("{}:/data", dir.path().join("host").display());
        let manager = LayerManager::with_mounter(layout.clone(), RecordingMounter::default());
        manager.new_workspace(Some(&spec), "busybox", "c1").unwrap();
        manager.mounter().ops.borrow_mut().clear();

        assert!(manager.delete_workspace(Some(&spec), "c1", "busybox").is_empty());
        assert_eq!(
            *manager.mounter().ops.borrow(),
            vec![
                Op::Unmount(layout.merged_dir("c1").join("data")),
                Op::Unmount(layout.merged_dir("c1")),
            ]
        );
        assert!(dir.path().join("host").is_dir());
    }

    #[test]
    fn failed_volume_mount_unwinds_root() {
        let (dir, layout) = setup();
        let spec = format!("{}:/data", dir.path().join("host").display());
        let mounter = RecordingMounter {
            fail_mount_at: Some(layout.merged_dir("c1").join("data")),
            ..RecordingMounter::default()
        };
        let manager = LayerManager::with_mounter(layout.clone(), mounter);
        assert!(manager.new_workspace(Some(&spec), "busybox", "c1").is_err());
        assert!(!layout.container_layers("c1").exists());
        assert_eq!(
            manager.mounter().ops.borrow().last(),
            Some(&Op::Unmount(layout.merged_dir("c1")))
        );
    }

    #[test]
    fn failed_root_mount_leaves_no_layers() {
        let (_dir, layout) = setup();
        let mounter = RecordingMounter {
            fail_mount_at: Some(layout.merged_dir("c1")),
            ..RecordingMounter::default()
        };
        let manager = LayerManager::with_mounter(layout.clone(), mounter);
        assert!(manager.new_workspace(None, "busybox", "c1").is_err());
        assert!(!layout.container_layers("c1").exists());
        assert!(layout.image_layer("busybox").join("marker").is_file());
    }

    #[test]
    fn volume_escaping_root_is_skipped() {
        let (dir, layout) = setup();
        let spec = format!("{}:/../../../etc", dir.path().join("host").display());
        let manager = LayerManager::with_mounter(layout, RecordingMounter::default());
        let layers = manager.new_workspace(Some(&spec), "busybox", "c1").unwrap();
        assert_eq!(layers.volume_target, None);
        assert_eq!(manager.mounter().ops.borrow().len(), 1);
        assert!(!dir.path().join("host").exists());
    }
}
