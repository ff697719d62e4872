//! Isolated container process launcher.
//!
//! The launcher re-executes the running binary in `init` mode inside fresh
//! PID, mount, network, IPC and UTS namespaces. The child's working
//! directory is the container's merged root, and the user command reaches
//! it through a pipe inherited at [`INIT_PIPE_FD`]: the parent writes the
//! space-joined command once and closes its end, and the child reads until
//! EOF.

use std::ffi::CString;
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use hull_common::constants::{INIT_ARG, INIT_PIPE_FD};
use hull_common::error::{HullError, Result};
use hull_common::layout::Layout;
use hull_core::filesystem::{LayerManager, LayerSet, Mounter};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

/// Path the child re-executes to enter `init` mode.
const SELF_EXE: &str = "/proc/self/exe";

/// Stack size handed to `clone(2)` for the pre-exec child.
const STACK_SIZE: usize = 1024 * 1024;

/// Exit code of a child that failed before reaching `execve`.
const SPAWN_FAILED: isize = 127;

/// A configured but not yet started container process.
#[derive(Debug)]
pub struct IsolatedProcess {
    layers: LayerSet,
    read_end: OwnedFd,
    log: Option<File>,
    env: Vec<String>,
}

/// Write end of the command handoff pipe.
#[derive(Debug)]
pub struct CommandPipe {
    write_end: File,
}

/// Handle to a started container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerProcess {
    pid: Pid,
}

/// Prepares the process for container `name` built from `image`.
///
/// Mounts the container workspace, opens the command pipe and, unless
/// `tty` is set, creates the log file receiving the child's stdout and
/// stderr. `env` entries (`KEY=VALUE`) are appended to the launcher's own
/// environment.
///
/// # Errors
///
/// Returns an error if the pipe, the log file or the workspace cannot be
/// created.
pub fn new_isolated_process<M: Mounter>(
    layers: &LayerManager<M>,
    layout: &Layout,
    tty: bool,
    volume: Option<&str>,
    name: &str,
    image: &str,
    env: &[String],
) -> Result<(IsolatedProcess, CommandPipe)> {
    let (read_end, write_end) = command_pipe()?;

    let log = if tty {
        None
    } else {
        let dir = layout.container_dir(name);
        std::fs::create_dir_all(&dir).map_err(|e| HullError::io(&dir, e))?;
        let path = layout.log_file(name);
        Some(File::create(&path).map_err(|e| HullError::io(path, e))?)
    };

    let layers = layers.new_workspace(volume, image, name)?;
    tracing::debug!(container = name, root = %layers.merged_dir.display(), tty, "process prepared");

    Ok((
        IsolatedProcess {
            layers,
            read_end,
            log,
            env: env.to_vec(),
        },
        CommandPipe {
            write_end: File::from(write_end),
        },
    ))
}

#[cfg(target_os = "linux")]
fn command_pipe() -> Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC).map_err(|e| HullError::kernel("pipe2", e))
}

#[cfg(not(target_os = "linux"))]
fn command_pipe() -> Result<(OwnedFd, OwnedFd)> {
    Err(HullError::Config {
        message: "Linux required for native container operations".into(),
    })
}

impl IsolatedProcess {
    /// Returns the workspace the process will run in.
    #[must_use]
    pub const fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Clones the child into new namespaces and execs `init` in it.
    ///
    /// The child blocks in `init` until the command arrives on the pipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the exec arguments cannot be encoded or
    /// `clone(2)` fails.
    #[cfg(target_os = "linux")]
    pub fn start(self) -> Result<ContainerProcess> {
        use hull_core::namespace::NamespaceSet;
        use nix::sched::clone;

        let exe = c_string(SELF_EXE.as_bytes())?;
        let init = c_string(INIT_ARG.as_bytes())?;
        let cwd = c_string(self.layers.merged_dir.as_os_str().as_bytes())?;
        let envp = child_env(&self.env)?;

        let argv_ptrs = [exe.as_ptr(), init.as_ptr(), std::ptr::null()];
        let mut envp_ptrs: Vec<*const libc::c_char> = envp.iter().map(|e| e.as_ptr()).collect();
        envp_ptrs.push(std::ptr::null());

        let read_fd = self.read_end.as_raw_fd();
        let log_fd = self.log.as_ref().map(AsRawFd::as_raw_fd);

        // Runs in the cloned child: only async-signal-safe calls on
        // prebuilt data until execve.
        let child = Box::new(|| -> isize {
            // SAFETY: dup2, fcntl, chdir and execve are async-signal-safe.
            // Every pointer comes from a CString or pointer array built before
            // the clone, NUL-terminated and alive in the child's copy of the
            // address space. Nothing here allocates or takes a lock.
            unsafe {
                if let Some(fd) = log_fd {
                    if libc::dup2(fd, libc::STDOUT_FILENO) < 0 || libc::dup2(fd, libc::STDERR_FILENO) < 0 {
                        return SPAWN_FAILED;
                    }
                }
                if read_fd == INIT_PIPE_FD {
                    let flags = libc::fcntl(read_fd, libc::F_GETFD);
                    if flags < 0 || libc::fcntl(read_fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                        return SPAWN_FAILED;
                    }
                } else if libc::dup2(read_fd, INIT_PIPE_FD) < 0 {
                    return SPAWN_FAILED;
                }
                if libc::chdir(cwd.as_ptr()) < 0 {
                    return SPAWN_FAILED;
                }
                let _ = libc::execve(exe.as_ptr(), argv_ptrs.as_ptr(), envp_ptrs.as_ptr());
            }
            SPAWN_FAILED
        });

        let mut stack = vec![0_u8; STACK_SIZE];
        let flags = NamespaceSet::default().clone_flags();
        // SAFETY: without CLONE_VM the child runs on a copy of this address
        // space, so the closure's captures stay valid there. `stack` outlives
        // the call, and the child only makes the calls vetted above before
        // execve replaces it.
        let pid = unsafe { clone(child, &mut stack, flags, Some(Signal::SIGCHLD as i32)) }
            .map_err(|e| HullError::kernel("clone", e))?;

        tracing::info!(pid = pid.as_raw(), root = %self.layers.merged_dir.display(), "container process started");
        Ok(ContainerProcess { pid })
    }

    /// Clones the child into new namespaces and execs `init` in it.
    ///
    /// # Errors
    ///
    /// Always returns an error on non-Linux platforms.
    #[cfg(not(target_os = "linux"))]
    pub fn start(self) -> Result<ContainerProcess> {
        Err(HullError::Config {
            message: "Linux required for native container operations".into(),
        })
    }
}

fn c_string(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|e| HullError::Config {
        message: format!("argument contains a NUL byte: {e}"),
    })
}

/// Builds the child environment: the launcher's own plus `extra`.
fn child_env(extra: &[String]) -> Result<Vec<CString>> {
    std::env::vars_os()
        .map(|(key, value)| {
            let mut entry = key.into_vec();
            entry.push(b'=');
            entry.extend(value.into_vec());
            entry
        })
        .chain(extra.iter().map(|e| e.clone().into_bytes()))
        .map(|entry| c_string(&entry))
        .collect()
}

impl CommandPipe {
    /// Sends `command` to the child and closes the pipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn send(mut self, command: &[String]) -> Result<()> {
        let line = command.join(" ");
        self.write_end
            .write_all(line.as_bytes())
            .map_err(|e| HullError::io("<command pipe>", e))?;
        tracing::debug!(command = %line, "command sent to container");
        Ok(())
    }
}

impl ContainerProcess {
    /// Wraps an existing host process id.
    #[must_use]
    pub const fn from_pid(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// Returns the host pid of the container init process.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid.as_raw().unsigned_abs()
    }

    /// Blocks until the process exits and returns its exit code.
    ///
    /// A process killed by a signal reports `128 + signal`.
    ///
    /// # Errors
    ///
    /// Returns an error if `waitpid(2)` fails.
    pub fn wait(&self) -> Result<i32> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(128 + sig as i32),
                Ok(_) | Err(nix::errno::Errno::EINTR) => {}
                Err(e) => return Err(HullError::kernel("waitpid", e)),
            }
        }
    }

    /// Sends `SIGTERM` to the process.
    ///
    /// A container init without a `SIGTERM` handler ignores it.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn terminate(&self) -> Result<()> {
        signal::kill(self.pid, Signal::SIGTERM).map_err(|e| HullError::kernel("kill", e))
    }

    /// Sends `SIGKILL` to the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn kill(&self) -> Result<()> {
        signal::kill(self.pid, Signal::SIGKILL).map_err(|e| HullError::kernel("kill", e))
    }
}
