//! Scoped entry into another process's network namespace.
//!
//! Namespace membership belongs to the OS thread, so the guard is `!Send`:
//! it must be dropped on the thread that created it, which restores the
//! thread's original namespace on every exit path.

use std::fs::File;
use std::marker::PhantomData;
use std::path::PathBuf;

use hull_common::error::{HullError, Result};

/// Path of the calling thread's own network namespace handle.
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Opens the network namespace handle of process `pid`.
///
/// # Errors
///
/// Returns an error if the process does not exist or the handle cannot be
/// opened.
pub fn open_netns(pid: u32) -> Result<File> {
    let path = PathBuf::from(format!("/proc/{pid}/ns/net"));
    File::open(&path).map_err(|e| HullError::io(path, e))
}

/// Keeps the current thread inside a foreign network namespace.
#[derive(Debug)]
pub struct NetnsGuard {
    original: File,
    _not_send: PhantomData<*const ()>,
}

impl NetnsGuard {
    /// Switches the calling thread into the namespace referred to by `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current namespace cannot be saved or
    /// `setns(2)` fails; the thread is then still in its original namespace.
    #[cfg(target_os = "linux")]
    pub fn enter(target: &File) -> Result<Self> {
        use nix::sched::{CloneFlags, setns};

        let original = File::open(THREAD_NETNS).map_err(|e| HullError::io(THREAD_NETNS, e))?;
        setns(target, CloneFlags::CLONE_NEWNET).map_err(|e| HullError::kernel("setns", e))?;
        tracing::debug!("entered container network namespace");
        Ok(Self {
            original,
            _not_send: PhantomData,
        })
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error; network namespaces require Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn enter(_target: &File) -> Result<Self> {
        Err(HullError::Config {
            message: "Linux required for native container operations".into(),
        })
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        #[cfg(target_os = "linux")]
        {
            use nix::sched::{CloneFlags, setns};

            match setns(&self.original, CloneFlags::CLONE_NEWNET) {
                Ok(()) => tracing::debug!("restored original network namespace"),
                Err(e) => tracing::error!(error = %e, "failed to restore network namespace"),
            }
        }
    }
}
