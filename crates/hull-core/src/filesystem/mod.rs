//! Filesystem management for container isolation.
//!
//! Provides `OverlayFS` workspaces with optional volumes, `pivot_root` for
//! switching into the container root, and the in-container mount setup.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
pub mod volume;
pub mod workspace;

pub use overlayfs::{KernelMounter, Mounter, OverlayConfig};
pub use volume::VolumeSpec;
pub use workspace::{LayerManager, LayerSet};
