//! Linux namespace management for container isolation.
//!
//! [`NamespaceSet`] selects the namespaces a container is cloned into;
//! [`network::NetnsGuard`] temporarily moves the calling thread into a
//! container's network namespace.

pub mod network;

/// Namespaces a new container process is created in.
///
/// User namespaces are not supported; the container runs as host root.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSet {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate network namespace.
    pub network: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            network: true,
            ipc: true,
            uts: true,
        }
    }
}

#[cfg(target_os = "linux")]
impl NamespaceSet {
    /// Returns the `clone(2)` flags creating every selected namespace.
    #[must_use]
    pub fn clone_flags(&self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;

        let mut flags = CloneFlags::empty();
        for (enabled, flag) in [
            (self.pid, CloneFlags::CLONE_NEWPID),
            (self.mount, CloneFlags::CLONE_NEWNS),
            (self.network, CloneFlags::CLONE_NEWNET),
            (self.ipc, CloneFlags::CLONE_NEWIPC),
            (self.uts, CloneFlags::CLONE_NEWUTS),
        ] {
            if enabled {
                flags |= flag;
            }
        }
        flags
    }
}
